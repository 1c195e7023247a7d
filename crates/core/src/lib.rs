//! Core library for the syncplay engine.
//!
//! A game plays a playlist of media items and keeps an output device in step
//! with them. Time advances in discrete ticks; on every tick the loop
//! observable dispatches to its processors in subscription order, and the
//! long-lived services reconcile the session afterwards. A single interrupt
//! flag halts all device and audio output immediately.
//!
//! Hosts normally only touch [`GameEngine`]; the lower layers are public so
//! adapters, tools and tests can drive them directly.

pub mod audio;
pub mod config;
pub mod device;
pub mod error;
pub mod game;
pub mod interrupt;
pub mod loops;
pub mod mapping;
pub mod media;
pub mod notification;
pub mod observable;
pub mod services;
pub mod session;
pub mod timeline;

pub use audio::{AudioBackend, AudioBridge, AudioContext, MoanCue, SilentAudio};
pub use config::{AppConfig, Configuration, EngineTuning};
pub use device::{DeviceAdapter, DeviceCommand, DeviceLink, DeviceStats, SimulatedDevice};
pub use error::{ensure_invariant, DeviceError, Result, SyncError};
pub use game::{
    run_realtime, run_simulated, GameEngine, GameRequest, GameSnapshot, GameStatus, RunSummary,
    StopReason, TickReport,
};
pub use interrupt::Interrupt;
pub use mapping::TransferFunction;
pub use media::{
    CurvePoint, GameAction, IntensityCurve, LinkResolver, MediaDescriptor, MediaLibrary, MediaLink,
    MediaRef, MediaResolver, MediaType, StrokePattern,
};
pub use notification::{Notification, NotificationLog, NotificationSink, Severity, TracingNotifier};
pub use observable::{DispatchReport, LoopContext, LoopObservable, LoopProcessor, SubscriptionId};
pub use services::{MediaPhase, Service, ServiceState};
pub use session::SessionState;
pub use timeline::{ActionCursor, Pacer, ScheduledAction, Tick, TickSource};
