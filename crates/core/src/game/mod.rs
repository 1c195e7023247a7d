//! Top-level game lifecycle: wires the tick source, loop observable,
//! services, device and audio together.

use std::time::Duration;

use serde::Serialize;

use crate::loops::game_loops;
use crate::services::{game_services, Service, ServiceContext, ServiceState};
use crate::{
    AudioBackend, AudioBridge, Configuration, DeviceAdapter, DeviceLink, DeviceStats,
    DispatchReport, EngineTuning, Interrupt, LoopContext, LoopObservable, MediaDescriptor,
    NotificationSink, Pacer, Result, SessionState, StrokePattern, SubscriptionId, Tick,
    TickSource,
};

/// Everything needed to start a game.
#[derive(Debug, Clone, Default)]
pub struct GameRequest {
    pub config: Configuration,
    pub playlist: Vec<MediaDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GameStatus {
    Idle,
    Running,
}

/// Result of one engine tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub tick: Tick,
    pub dispatch: DispatchReport,
}

/// Resources shared by processors and services for the lifetime of the
/// engine. Kept apart from the observable and service list so both can be
/// borrowed alongside them.
struct Shared {
    session: SessionState,
    interrupt: Interrupt,
    device: DeviceLink,
    audio: AudioBridge,
    notifier: Box<dyn NotificationSink>,
}

impl Shared {
    fn service_ctx(&mut self) -> ServiceContext<'_> {
        ServiceContext {
            session: &mut self.session,
            device: &mut self.device,
            audio: &mut self.audio,
            notifier: self.notifier.as_ref(),
            interrupt: &self.interrupt,
        }
    }

    fn loop_ctx<'a>(&'a mut self, tuning: &'a EngineTuning) -> LoopContext<'a> {
        LoopContext::new(
            &mut self.session,
            tuning,
            &self.interrupt,
            &mut self.device,
            &mut self.audio,
            self.notifier.as_ref(),
        )
    }
}

/// The game engine. Single-threaded: the host calls [`GameEngine::tick`]
/// from one place, and every processor and service runs synchronously
/// inside that call.
pub struct GameEngine {
    tuning: EngineTuning,
    status: GameStatus,
    shared: Shared,
    observable: LoopObservable,
    subscriptions: Vec<SubscriptionId>,
    services: Vec<Box<dyn Service>>,
    ticks: TickSource,
}

impl GameEngine {
    pub fn new(
        tuning: EngineTuning,
        device: Box<dyn DeviceAdapter>,
        audio: Box<dyn AudioBackend>,
        notifier: Box<dyn NotificationSink>,
    ) -> Self {
        Self {
            tuning,
            status: GameStatus::Idle,
            shared: Shared {
                session: SessionState::default(),
                interrupt: Interrupt::new(),
                device: DeviceLink::new(device),
                audio: AudioBridge::new(audio),
                notifier,
            },
            observable: LoopObservable::new(),
            subscriptions: Vec::new(),
            services: game_services(),
            ticks: TickSource::new(),
        }
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == GameStatus::Running
    }

    pub fn session(&self) -> &SessionState {
        &self.shared.session
    }

    pub fn tuning(&self) -> &EngineTuning {
        &self.tuning
    }

    pub fn observable(&self) -> &LoopObservable {
        &self.observable
    }

    /// `(name, state)` for every service, in dependency order.
    pub fn service_states(&self) -> Vec<(&'static str, ServiceState)> {
        self.services
            .iter()
            .map(|service| (service.name(), service.state()))
            .collect()
    }

    /// A clone of the interrupt flag, for hosts that need to halt output from
    /// outside the tick loop.
    pub fn interrupt_handle(&self) -> Interrupt {
        self.shared.interrupt.clone()
    }

    pub fn device_connected(&self) -> bool {
        self.shared.device.connected()
    }

    pub fn device_stats(&self) -> DeviceStats {
        self.shared.device.stats()
    }

    pub fn audio_active(&self) -> bool {
        self.shared.audio.is_active()
    }

    /// True once the current item has ended and nothing else is queued.
    pub fn playlist_finished(&self) -> bool {
        let session = &self.shared.session;
        let current_done = session
            .current_media()
            .map(|_| session.media_ended())
            .unwrap_or(true);
        current_done && session.queued_media() == 0
    }

    /// Starts a new game. A game that is already running is stopped first.
    ///
    /// The configuration is validated before anything else happens, so an
    /// invalid request returns `InvalidConfig` and leaves a running game
    /// untouched. Any later error leaves nothing running: the audio context
    /// is released and every service is back in `Idle`.
    pub fn start_game(&mut self, request: GameRequest) -> Result<()> {
        request.config.validate()?;
        self.tuning.validate()?;

        if self.is_running() {
            tracing::info!("restarting game, stopping the running session first");
            self.stop_game();
        }

        self.shared.audio.create()?;

        self.shared.interrupt.clear();
        self.shared.session =
            SessionState::with_playlist(request.config.clone(), request.playlist);
        self.shared.device.begin_session(self.tuning.device_epsilon);
        self.ticks.reset();

        for index in 0..self.services.len() {
            let outcome =
                self.services[index].initialize(&request.config, &mut self.shared.service_ctx());
            if let Err(err) = outcome {
                tracing::warn!(
                    service = self.services[index].name(),
                    error = %err,
                    "game start aborted"
                );
                self.release();
                return Err(err);
            }
        }

        for mut processor in game_loops() {
            processor.reset();
            let id = self.observable.subscribe(processor);
            self.subscriptions.push(id);
        }

        self.status = GameStatus::Running;
        tracing::info!(
            loops = self.subscriptions.len(),
            queued = self.shared.session.queued_media(),
            "game started"
        );
        Ok(())
    }

    /// Stops the game: raises the interrupt, returns the device to neutral,
    /// stops services in reverse dependency order and unsubscribes every loop.
    /// Safe to call repeatedly.
    pub fn stop_game(&mut self) {
        self.shared.interrupt.raise();
        if !self.is_running() {
            return;
        }

        self.shared.device.reset();
        self.release();
        self.status = GameStatus::Idle;
        tracing::info!(stats = ?self.shared.device.stats(), "game stopped");
    }

    fn release(&mut self) {
        for service in self.services.iter_mut().rev() {
            service.stop(&mut self.shared.service_ctx());
        }
        for id in self.subscriptions.drain(..) {
            self.observable.unsubscribe(id);
        }
        self.shared.audio.destroy();
    }

    /// Advances the game by `delta_ms`. Returns `None` when no game is running.
    pub fn tick(&mut self, delta_ms: f64) -> Option<TickReport> {
        if !self.is_running() {
            return None;
        }
        let tick = self.ticks.tick_by(delta_ms);
        Some(self.process(tick))
    }

    /// Advances the game to an absolute host timestamp.
    pub fn tick_at(&mut self, timestamp_ms: f64) -> Option<TickReport> {
        if !self.is_running() {
            return None;
        }
        let tick = self.ticks.tick_at(timestamp_ms);
        Some(self.process(tick))
    }

    fn process(&mut self, tick: Tick) -> TickReport {
        let dispatch = {
            let mut ctx = self.shared.loop_ctx(&self.tuning);
            self.observable.dispatch(&tick, &mut ctx)
        };

        if !self.shared.interrupt.is_raised() {
            for service in &mut self.services {
                if let Err(err) = service.sync(&mut self.shared.service_ctx()) {
                    tracing::warn!(service = service.name(), error = %err, "service sync failed");
                }
            }
        }

        TickReport { tick, dispatch }
    }

    pub fn snapshot(&self) -> GameSnapshot {
        let session = &self.shared.session;
        GameSnapshot {
            status: self.status,
            ticks: self.ticks.produced(),
            media: session.current_media().map(|media| media.id.clone()),
            queued: session.queued_media(),
            position_ms: session.playback_position_ms(),
            stroke_speed: session.stroke_speed(),
            stroke_speed_baseline: session.stroke_speed_baseline(),
            stroke_pattern: session.stroke_pattern(),
            grip: session.grip(),
            device: self.shared.device.stats(),
        }
    }
}

impl std::fmt::Debug for GameEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameEngine")
            .field("status", &self.status)
            .field("observable", &self.observable)
            .field("device", &self.shared.device)
            .field("audio", &self.shared.audio)
            .finish()
    }
}

impl Drop for GameEngine {
    fn drop(&mut self) {
        self.stop_game();
    }
}

/// Point-in-time view of a game, suitable for logging or JSON output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub status: GameStatus,
    pub ticks: u64,
    pub media: Option<String>,
    pub queued: usize,
    pub position_ms: f64,
    pub stroke_speed: f64,
    pub stroke_speed_baseline: f64,
    pub stroke_pattern: StrokePattern,
    pub grip: f64,
    pub device: DeviceStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    NotRunning,
    Interrupted,
    PlaylistFinished,
    TickLimit,
    TimeBudget,
}

/// How a driven run ended. The game is always stopped when a driver returns.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub reason: StopReason,
    pub ticks: u64,
    pub final_state: GameSnapshot,
}

fn check_stop(engine: &GameEngine) -> Option<StopReason> {
    if !engine.is_running() {
        Some(StopReason::NotRunning)
    } else if engine.shared.interrupt.is_raised() {
        Some(StopReason::Interrupted)
    } else if engine.playlist_finished() {
        Some(StopReason::PlaylistFinished)
    } else {
        None
    }
}

fn finish(engine: &mut GameEngine, reason: StopReason, ticks: u64) -> RunSummary {
    let final_state = engine.snapshot();
    engine.stop_game();
    tracing::info!(?reason, ticks, "run finished");
    RunSummary {
        reason,
        ticks,
        final_state,
    }
}

/// Drives the engine against the wall clock at the tuned tick interval until
/// the playlist ends, the interrupt is raised or `budget` elapses.
pub fn run_realtime(engine: &mut GameEngine, budget: Option<Duration>) -> RunSummary {
    let mut pacer = Pacer::new(Duration::from_millis(engine.tuning.tick_interval_ms));
    let mut ticks = 0;

    loop {
        if let Some(reason) = check_stop(engine) {
            return finish(engine, reason, ticks);
        }
        if budget.is_some_and(|budget| pacer.elapsed() >= budget) {
            return finish(engine, StopReason::TimeBudget, ticks);
        }

        let delta_ms = pacer.wait_next();
        if engine.tick(delta_ms).is_some() {
            ticks += 1;
        }
    }
}

/// Drives the engine with a fixed delta as fast as possible. Deterministic,
/// for offline simulation and tests.
pub fn run_simulated(engine: &mut GameEngine, delta_ms: f64, max_ticks: u64) -> RunSummary {
    let mut ticks = 0;

    loop {
        if let Some(reason) = check_stop(engine) {
            return finish(engine, reason, ticks);
        }
        if ticks >= max_ticks {
            return finish(engine, StopReason::TickLimit, ticks);
        }

        if engine.tick(delta_ms).is_some() {
            ticks += 1;
        }
    }
}
