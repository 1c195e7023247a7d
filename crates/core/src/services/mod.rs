//! Long-lived state machines that own one session concern each.
//!
//! All services share the lifecycle `Idle -> Initializing -> Running ->
//! Stopping -> Idle`, driven through [`Lifecycle`] so that every transition
//! goes through the same table.

mod action;
mod grip;
mod media;
mod stroke;

pub use action::ActionService;
pub use grip::GripService;
pub use media::{MediaPhase, MediaService};
pub use stroke::StrokeService;

use serde::Serialize;

use crate::{
    AudioBridge, Configuration, DeviceLink, Interrupt, NotificationSink, Result, SessionState,
    SyncError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceState {
    Idle,
    Initializing,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEvent {
    Initialize,
    Ready,
    Fail,
    Stop,
    Stopped,
}

impl ServiceState {
    /// The transition table. `None` marks an invalid transition.
    pub fn transition(self, event: ServiceEvent) -> Option<ServiceState> {
        use ServiceEvent as E;
        use ServiceState as S;

        match (self, event) {
            (S::Idle, E::Initialize) => Some(S::Initializing),
            (S::Initializing, E::Ready) => Some(S::Running),
            (S::Initializing, E::Fail) => Some(S::Idle),
            (S::Initializing, E::Stop) => Some(S::Stopping),
            (S::Running, E::Initialize) => Some(S::Running),
            (S::Running, E::Stop) => Some(S::Stopping),
            (S::Stopping, E::Stopped) => Some(S::Idle),
            (S::Idle, E::Ready | E::Fail | E::Stop | E::Stopped)
            | (S::Initializing, E::Initialize | E::Stopped)
            | (S::Running, E::Ready | E::Fail | E::Stopped)
            | (S::Stopping, E::Initialize | E::Ready | E::Fail | E::Stop) => None,
        }
    }
}

/// Lifecycle bookkeeping embedded in every service.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    service: &'static str,
    state: ServiceState,
}

impl Lifecycle {
    pub fn new(service: &'static str) -> Self {
        Self {
            service,
            state: ServiceState::Idle,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ServiceState::Running
    }

    fn apply(&mut self, event: ServiceEvent) -> Option<ServiceState> {
        let next = self.state.transition(event);
        match next {
            Some(next) => {
                if next != self.state {
                    tracing::debug!(
                        service = self.service,
                        from = ?self.state,
                        to = ?next,
                        "service transition"
                    );
                }
                self.state = next;
            }
            None => {
                tracing::trace!(
                    service = self.service,
                    state = ?self.state,
                    ?event,
                    "transition ignored"
                );
            }
        }
        next
    }

    /// Returns `Ok(true)` when the caller must run its setup, `Ok(false)` when
    /// the service is already running and only needs its configuration
    /// re-applied.
    pub fn begin_initialize(&mut self) -> Result<bool> {
        let was_running = self.is_running();
        match self.apply(ServiceEvent::Initialize) {
            Some(_) => Ok(!was_running),
            None => Err(SyncError::msg(format!(
                "{} cannot initialise while {:?}",
                self.service, self.state
            ))),
        }
    }

    /// Completes initialisation. On failure the service falls back to `Idle`
    /// and the error is returned unchanged.
    pub fn finish_initialize<T>(&mut self, outcome: Result<T>) -> Result<T> {
        let event = if outcome.is_ok() {
            ServiceEvent::Ready
        } else {
            ServiceEvent::Fail
        };
        self.apply(event);
        if let Err(err) = &outcome {
            tracing::warn!(service = self.service, error = %err, "service failed to initialise");
        }
        outcome
    }

    /// Returns `true` when the caller must release its resources. Stopping an
    /// idle service is a no-op.
    pub fn begin_stop(&mut self) -> bool {
        self.apply(ServiceEvent::Stop).is_some()
    }

    pub fn finish_stop(&mut self) {
        self.apply(ServiceEvent::Stopped);
    }
}

/// Shared resources a service may touch during a lifecycle call.
pub struct ServiceContext<'a> {
    pub session: &'a mut SessionState,
    pub device: &'a mut DeviceLink,
    pub audio: &'a mut AudioBridge,
    pub notifier: &'a dyn NotificationSink,
    pub interrupt: &'a Interrupt,
}

/// A lifecycle-managed state machine owning one concern of the session.
pub trait Service {
    fn name(&self) -> &'static str;

    fn state(&self) -> ServiceState;

    /// Brings the service to `Running`. Idempotent: calling it while running
    /// re-applies `config` without repeating one-time setup.
    fn initialize(&mut self, config: &Configuration, ctx: &mut ServiceContext<'_>) -> Result<()>;

    /// Returns the service to `Idle`, releasing what it owns. Safe from any
    /// state.
    fn stop(&mut self, ctx: &mut ServiceContext<'_>);

    /// Called after every dispatched tick while the game runs.
    fn sync(&mut self, _ctx: &mut ServiceContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// The game's services in dependency order. They are stopped in reverse.
pub fn game_services() -> Vec<Box<dyn Service>> {
    vec![
        Box::new(MediaService::new()),
        Box::new(StrokeService::new()),
        Box::new(GripService::new()),
        Box::new(ActionService::new()),
    ]
}
