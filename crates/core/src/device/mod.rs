use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::{DeviceError, Interrupt, Notification, NotificationSink, SyncError};

/// Protocol-neutral instruction for the haptic device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceCommand {
    /// Stroke speed in strokes per second.
    SetSpeed(f64),
    /// Grip tension in `[0, 1]`.
    SetGrip(f64),
    Stop,
}

/// Boundary to the external hardware client.
pub trait DeviceAdapter {
    fn connected(&self) -> bool;

    /// Returns the device to a neutral, safe state. Must be a no-op when the
    /// device is not connected.
    fn reset(&mut self) -> Result<(), DeviceError>;

    fn send(&mut self, command: &DeviceCommand) -> Result<(), DeviceError>;
}

#[derive(Debug, Clone)]
struct SimulatedState {
    connected: bool,
    commands: Vec<DeviceCommand>,
    resets: usize,
    failures_pending: usize,
}

/// In-memory device used by the command line host and tests. Clones share
/// the same state, so one clone can be handed to the engine while another
/// inspects what was sent.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    state: Arc<Mutex<SimulatedState>>,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimulatedState {
                connected: true,
                commands: Vec::new(),
                resets: 0,
                failures_pending: 0,
            })),
        }
    }

    pub fn disconnected() -> Self {
        let device = Self::new();
        device.set_connected(false);
        device
    }

    pub fn set_connected(&self, connected: bool) {
        if let Ok(mut state) = self.lock() {
            state.connected = connected;
        }
    }

    /// Makes the next `count` sends fail with [`DeviceError::Rejected`].
    pub fn fail_next(&self, count: usize) {
        if let Ok(mut state) = self.lock() {
            state.failures_pending = count;
        }
    }

    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.lock()
            .map(|state| state.commands.clone())
            .unwrap_or_default()
    }

    pub fn resets(&self) -> usize {
        self.lock().map(|state| state.resets).unwrap_or_default()
    }

    pub fn clear_history(&self) {
        if let Ok(mut state) = self.lock() {
            state.commands.clear();
            state.resets = 0;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimulatedState>, DeviceError> {
        self.state.lock().map_err(|_| DeviceError::Poisoned)
    }
}

impl DeviceAdapter for SimulatedDevice {
    fn connected(&self) -> bool {
        self.lock().map(|state| state.connected).unwrap_or(false)
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        let mut state = self.lock()?;
        if state.connected {
            state.resets += 1;
        }
        Ok(())
    }

    fn send(&mut self, command: &DeviceCommand) -> Result<(), DeviceError> {
        let mut state = self.lock()?;
        if !state.connected {
            return Err(DeviceError::Disconnected);
        }
        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            return Err(DeviceError::Rejected(format!("{command:?}")));
        }
        state.commands.push(*command);
        Ok(())
    }
}

/// Counters describing what happened at the device boundary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    pub delivered: u64,
    pub suppressed: u64,
    pub skipped_disconnected: u64,
    pub failed: u64,
}

/// Engine-side wrapper around a [`DeviceAdapter`].
///
/// Every outbound command passes through [`DeviceLink::send`], which drops it
/// while the interrupt is raised, skips it while the device is disconnected,
/// and absorbs send failures so the tick dispatch keeps running.
pub struct DeviceLink {
    adapter: Box<dyn DeviceAdapter>,
    epsilon: f64,
    last_speed: Option<f64>,
    last_grip: Option<f64>,
    disconnect_notified: bool,
    failing: bool,
    stats: DeviceStats,
}

impl DeviceLink {
    pub fn new(adapter: Box<dyn DeviceAdapter>) -> Self {
        Self {
            adapter,
            epsilon: 0.0,
            last_speed: None,
            last_grip: None,
            disconnect_notified: false,
            failing: false,
            stats: DeviceStats::default(),
        }
    }

    pub fn connected(&self) -> bool {
        self.adapter.connected()
    }

    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    /// Clears per-session bookkeeping.
    pub fn begin_session(&mut self, epsilon: f64) {
        self.epsilon = epsilon.max(0.0);
        self.last_speed = None;
        self.last_grip = None;
        self.disconnect_notified = false;
        self.failing = false;
        self.stats = DeviceStats::default();
    }

    /// Returns `true` when the command reached the device. Values within
    /// epsilon of the last delivered one are dropped, except an exact 0.
    pub fn send(
        &mut self,
        command: DeviceCommand,
        interrupt: &Interrupt,
        notifier: &dyn NotificationSink,
    ) -> bool {
        self.deliver(command, false, interrupt, notifier)
    }

    /// Like [`DeviceLink::send`] for a value that has reached its target: it
    /// is forwarded whenever it differs from the last delivered value at all,
    /// so the device ends up exactly where the session is.
    pub fn send_settled(
        &mut self,
        command: DeviceCommand,
        interrupt: &Interrupt,
        notifier: &dyn NotificationSink,
    ) -> bool {
        self.deliver(command, true, interrupt, notifier)
    }

    fn deliver(
        &mut self,
        command: DeviceCommand,
        settled: bool,
        interrupt: &Interrupt,
        notifier: &dyn NotificationSink,
    ) -> bool {
        if interrupt.is_raised() {
            self.stats.suppressed += 1;
            tracing::trace!(?command, "device command suppressed by interrupt");
            return false;
        }

        if self.is_redundant(&command, settled) {
            return false;
        }

        if !self.adapter.connected() {
            self.stats.skipped_disconnected += 1;
            if !self.disconnect_notified {
                self.disconnect_notified = true;
                tracing::warn!("device disconnected, output paused");
                notifier.notify(Notification::warning("Device disconnected"));
            }
            return false;
        }

        match self.adapter.send(&command) {
            Ok(()) => {
                self.stats.delivered += 1;
                self.failing = false;
                self.remember(&command);
                true
            }
            Err(err) => {
                self.stats.failed += 1;
                let err = SyncError::from(err);
                tracing::warn!(?command, error = %err, "device command dropped");
                if !self.failing {
                    self.failing = true;
                    notifier.notify(Notification::warning(format!("Device error: {err}")));
                }
                false
            }
        }
    }

    /// Returns the device to neutral. A disconnected device is left alone.
    pub fn reset(&mut self) {
        self.last_speed = None;
        self.last_grip = None;
        if !self.adapter.connected() {
            tracing::debug!("device reset skipped, not connected");
            return;
        }
        if let Err(err) = self.adapter.reset() {
            tracing::warn!(error = %err, "device reset failed");
        }
    }

    fn is_redundant(&self, command: &DeviceCommand, settled: bool) -> bool {
        let close = |last: Option<f64>, value: f64| match last {
            None => false,
            Some(last) if last == value => true,
            Some(_) if settled || value == 0.0 => false,
            Some(last) => (last - value).abs() < self.epsilon,
        };
        match *command {
            DeviceCommand::SetSpeed(value) => close(self.last_speed, value),
            DeviceCommand::SetGrip(value) => close(self.last_grip, value),
            DeviceCommand::Stop => false,
        }
    }

    fn remember(&mut self, command: &DeviceCommand) {
        match *command {
            DeviceCommand::SetSpeed(value) => self.last_speed = Some(value),
            DeviceCommand::SetGrip(value) => self.last_grip = Some(value),
            DeviceCommand::Stop => {
                self.last_speed = None;
                self.last_grip = None;
            }
        }
    }
}

impl std::fmt::Debug for DeviceLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLink")
            .field("connected", &self.adapter.connected())
            .field("epsilon", &self.epsilon)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NotificationLog;

    fn link(device: &SimulatedDevice) -> DeviceLink {
        let mut link = DeviceLink::new(Box::new(device.clone()));
        link.begin_session(0.01);
        link
    }

    #[test]
    fn reset_on_disconnected_device_is_a_no_op() {
        let mut device = SimulatedDevice::disconnected();
        assert!(device.reset().is_ok());
        assert_eq!(device.resets(), 0);

        let mut link = link(&device);
        link.reset();
        assert_eq!(device.resets(), 0);
    }

    #[test]
    fn interrupt_suppresses_commands() {
        let device = SimulatedDevice::new();
        let mut link = link(&device);
        let interrupt = Interrupt::new();
        let log = NotificationLog::new();

        interrupt.raise();
        assert!(!link.send(DeviceCommand::SetSpeed(1.0), &interrupt, &log));
        assert!(device.commands().is_empty());
        assert_eq!(link.stats().suppressed, 1);
    }

    #[test]
    fn disconnect_is_notified_once() {
        let device = SimulatedDevice::disconnected();
        let mut link = link(&device);
        let interrupt = Interrupt::new();
        let log = NotificationLog::new();

        for speed in [1.0, 2.0, 3.0] {
            assert!(!link.send(DeviceCommand::SetSpeed(speed), &interrupt, &log));
        }

        assert_eq!(log.count_matching("disconnected"), 1);
        assert_eq!(link.stats().skipped_disconnected, 3);
    }

    #[test]
    fn send_failures_are_absorbed() {
        let device = SimulatedDevice::new();
        device.fail_next(2);
        let mut link = link(&device);
        let interrupt = Interrupt::new();
        let log = NotificationLog::new();

        assert!(!link.send(DeviceCommand::SetSpeed(1.0), &interrupt, &log));
        assert!(!link.send(DeviceCommand::SetSpeed(1.0), &interrupt, &log));
        assert!(link.send(DeviceCommand::SetSpeed(1.0), &interrupt, &log));

        assert_eq!(log.count_matching("Device error"), 1);
        assert_eq!(device.commands(), vec![DeviceCommand::SetSpeed(1.0)]);
        assert_eq!(link.stats().failed, 2);
    }

    #[test]
    fn rest_and_settled_values_bypass_epsilon() {
        let device = SimulatedDevice::new();
        let mut link = link(&device);
        let interrupt = Interrupt::new();
        let log = NotificationLog::new();

        link.send(DeviceCommand::SetSpeed(0.008), &interrupt, &log);
        assert!(link.send(DeviceCommand::SetSpeed(0.0), &interrupt, &log));
        assert!(!link.send(DeviceCommand::SetSpeed(0.0), &interrupt, &log));

        link.send(DeviceCommand::SetSpeed(1.998), &interrupt, &log);
        assert!(!link.send(DeviceCommand::SetSpeed(2.0), &interrupt, &log));
        assert!(link.send_settled(DeviceCommand::SetSpeed(2.0), &interrupt, &log));
        assert!(!link.send_settled(DeviceCommand::SetSpeed(2.0), &interrupt, &log));

        assert_eq!(device.commands().last(), Some(&DeviceCommand::SetSpeed(2.0)));
    }

    #[test]
    fn send_failures_carry_the_device_error() {
        let device = SimulatedDevice::new();
        device.fail_next(1);
        let mut link = link(&device);
        let log = NotificationLog::new();

        link.send(DeviceCommand::SetGrip(0.4), &Interrupt::new(), &log);

        assert_eq!(log.count_matching("Device error: device send failed"), 1);
    }

    #[test]
    fn near_identical_values_are_not_resent() {
        let device = SimulatedDevice::new();
        let mut link = link(&device);
        let interrupt = Interrupt::new();
        let log = NotificationLog::new();

        link.send(DeviceCommand::SetSpeed(1.0), &interrupt, &log);
        link.send(DeviceCommand::SetSpeed(1.005), &interrupt, &log);
        link.send(DeviceCommand::SetSpeed(1.5), &interrupt, &log);
        link.send(DeviceCommand::Stop, &interrupt, &log);
        link.send(DeviceCommand::SetSpeed(1.5), &interrupt, &log);

        assert_eq!(
            device.commands(),
            vec![
                DeviceCommand::SetSpeed(1.0),
                DeviceCommand::SetSpeed(1.5),
                DeviceCommand::Stop,
                DeviceCommand::SetSpeed(1.5),
            ]
        );
    }
}
