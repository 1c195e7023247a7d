use super::{Lifecycle, Service, ServiceContext, ServiceState};
use crate::{Configuration, GameAction, MoanCue, Notification, Result};

/// Executes the discrete actions fired by the action loop. Pattern changes
/// belong to the stroke service and are only drained here.
#[derive(Debug)]
pub struct ActionService {
    lifecycle: Lifecycle,
    handled: usize,
    failed: usize,
}

impl Default for ActionService {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionService {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new("action"),
            handled: 0,
            failed: 0,
        }
    }

    pub fn handled(&self) -> usize {
        self.handled
    }

    pub fn failed(&self) -> usize {
        self.failed
    }
}

impl Service for ActionService {
    fn name(&self) -> &'static str {
        "action"
    }

    fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    fn initialize(&mut self, _config: &Configuration, ctx: &mut ServiceContext<'_>) -> Result<()> {
        if !self.lifecycle.begin_initialize()? {
            return Ok(());
        }
        self.handled = 0;
        self.failed = 0;
        ctx.session.take_actions();
        self.lifecycle.finish_initialize(Ok(()))
    }

    fn stop(&mut self, ctx: &mut ServiceContext<'_>) {
        if !self.lifecycle.begin_stop() {
            return;
        }
        let dropped = ctx.session.take_actions().len();
        if dropped > 0 {
            tracing::debug!(dropped, "pending actions discarded");
        }
        self.lifecycle.finish_stop();
    }

    /// Executes every queued action. A failing action is logged and the
    /// rest of the queue still runs.
    fn sync(&mut self, ctx: &mut ServiceContext<'_>) -> Result<()> {
        if !self.lifecycle.is_running() {
            return Ok(());
        }

        for action in ctx.session.take_actions() {
            self.handled += 1;
            match action {
                GameAction::SetPattern { .. } => {}
                GameAction::Moan => {
                    if ctx.interrupt.is_raised() {
                        continue;
                    }
                    if let Err(err) = ctx.audio.play(MoanCue::Moderate) {
                        self.failed += 1;
                        tracing::warn!(error = %err, "moan action failed");
                    }
                }
                GameAction::Notify { message } => {
                    ctx.notifier.notify(Notification::info(message));
                }
            }
        }
        Ok(())
    }
}
