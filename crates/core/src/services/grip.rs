use super::{Lifecycle, Service, ServiceContext, ServiceState};
use crate::{Configuration, Notification, Result};

/// Owns grip output. Grip is active only while it is enabled in the
/// configuration and the device is connected; otherwise the game carries on
/// without it.
#[derive(Debug)]
pub struct GripService {
    lifecycle: Lifecycle,
    enabled: bool,
}

impl Default for GripService {
    fn default() -> Self {
        Self::new()
    }
}

impl GripService {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new("grip"),
            enabled: false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn refresh(&self, ctx: &mut ServiceContext<'_>) -> bool {
        let active = self.enabled && ctx.device.connected();
        if active != ctx.session.grip_active() {
            tracing::info!(active, "grip output toggled");
            ctx.session.set_grip_active(active);
        }
        active
    }
}

impl Service for GripService {
    fn name(&self) -> &'static str {
        "grip"
    }

    fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    fn initialize(&mut self, config: &Configuration, ctx: &mut ServiceContext<'_>) -> Result<()> {
        let first_start = self.lifecycle.begin_initialize()?;
        self.enabled = config.grip_enabled;
        let active = self.refresh(ctx);

        if first_start && self.enabled && !active {
            tracing::warn!("grip enabled but device is not connected");
            ctx.notifier.notify(Notification::warning(
                "Grip disabled: device not connected",
            ));
        }

        if first_start {
            self.lifecycle.finish_initialize(Ok(()))
        } else {
            Ok(())
        }
    }

    fn stop(&mut self, ctx: &mut ServiceContext<'_>) {
        if !self.lifecycle.begin_stop() {
            return;
        }
        ctx.session.set_grip_active(false);
        ctx.session.set_grip(0.0);
        self.lifecycle.finish_stop();
    }

    fn sync(&mut self, ctx: &mut ServiceContext<'_>) -> Result<()> {
        if self.lifecycle.is_running() {
            self.refresh(ctx);
        }
        Ok(())
    }
}
