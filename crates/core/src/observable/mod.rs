//! Publish/subscribe registry that fans every tick out to the loop processors.
//!
//! Dispatch is synchronous and runs in subscription order on the caller's
//! thread. Processors may ask to unsubscribe themselves or others while a tick
//! is being delivered; such requests are queued on the [`LoopContext`] and
//! applied once every processor in the current snapshot has seen the tick.

use std::fmt;

use crate::{
    AudioBridge, DeviceCommand, DeviceLink, EngineTuning, Interrupt, MoanCue, Notification,
    NotificationSink, Result, SessionState, Tick,
};

/// Handle returned by [`LoopObservable::subscribe`]. Never reused while the
/// observable is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-tick state transform.
///
/// Implementations must not block: long-running work is split into per-tick
/// increments. A processor whose upstream state is missing returns `Ok(())`
/// without doing anything.
pub trait LoopProcessor {
    fn name(&self) -> &'static str;

    /// Re-initialises internal accumulators without re-subscribing.
    fn reset(&mut self);

    fn on_tick(&mut self, tick: &Tick, ctx: &mut LoopContext<'_>) -> Result<()>;
}

/// Everything a processor may touch while handling one tick.
pub struct LoopContext<'a> {
    pub session: &'a mut SessionState,
    pub tuning: &'a EngineTuning,
    interrupt: &'a Interrupt,
    device: &'a mut DeviceLink,
    audio: &'a mut AudioBridge,
    notifier: &'a dyn NotificationSink,
    current: Option<SubscriptionId>,
    detach: Vec<SubscriptionId>,
}

impl<'a> LoopContext<'a> {
    pub fn new(
        session: &'a mut SessionState,
        tuning: &'a EngineTuning,
        interrupt: &'a Interrupt,
        device: &'a mut DeviceLink,
        audio: &'a mut AudioBridge,
        notifier: &'a dyn NotificationSink,
    ) -> Self {
        Self {
            session,
            tuning,
            interrupt,
            device,
            audio,
            notifier,
            current: None,
            detach: Vec::new(),
        }
    }

    pub fn interrupted(&self) -> bool {
        self.interrupt.is_raised()
    }

    pub fn device_connected(&self) -> bool {
        self.device.connected()
    }

    /// Forwards a command to the device. Returns `false` when it was dropped.
    pub fn send(&mut self, command: DeviceCommand) -> bool {
        self.device.send(command, self.interrupt, self.notifier)
    }

    /// Forwards a value that has reached its target. See
    /// [`DeviceLink::send_settled`].
    pub fn send_settled(&mut self, command: DeviceCommand) -> bool {
        self.device.send_settled(command, self.interrupt, self.notifier)
    }

    /// Plays an audio cue. Returns `Ok(false)` when interrupted or when no
    /// audio context is live.
    pub fn play(&mut self, cue: MoanCue) -> Result<bool> {
        if self.interrupted() {
            return Ok(false);
        }
        self.audio.play(cue)
    }

    pub fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    /// The subscription currently receiving the tick.
    pub fn current_subscription(&self) -> Option<SubscriptionId> {
        self.current
    }

    /// Queues an unsubscribe, applied after the current dispatch completes.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        if !self.detach.contains(&id) {
            self.detach.push(id);
        }
    }

    pub fn unsubscribe_self(&mut self) {
        if let Some(id) = self.current {
            self.unsubscribe(id);
        }
    }
}

/// Outcome of delivering one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
    pub detached: usize,
}

struct Subscription {
    id: SubscriptionId,
    processor: Box<dyn LoopProcessor>,
}

#[derive(Default)]
pub struct LoopObservable {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl LoopObservable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, processor: Box<dyn LoopProcessor>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        tracing::debug!(%id, processor = processor.name(), "loop subscribed");
        self.subscriptions.push(Subscription { id, processor });
        id
    }

    /// Removes a subscription and hands the processor back. Unknown or
    /// already-removed ids are ignored.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Option<Box<dyn LoopProcessor>> {
        let index = self.subscriptions.iter().position(|sub| sub.id == id)?;
        let subscription = self.subscriptions.remove(index);
        tracing::debug!(%id, processor = subscription.processor.name(), "loop unsubscribed");
        Some(subscription.processor)
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.subscriptions.iter().any(|sub| sub.id == id)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Processor names in dispatch order.
    pub fn names(&self) -> Vec<&'static str> {
        self.subscriptions
            .iter()
            .map(|sub| sub.processor.name())
            .collect()
    }

    pub fn reset(&mut self, id: SubscriptionId) -> bool {
        match self.subscriptions.iter_mut().find(|sub| sub.id == id) {
            Some(sub) => {
                sub.processor.reset();
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&mut self) {
        for sub in &mut self.subscriptions {
            sub.processor.reset();
        }
    }

    /// Delivers `tick` to every subscriber in subscription order. A failing
    /// processor is logged and skipped; the others still receive the tick.
    pub fn dispatch(&mut self, tick: &Tick, ctx: &mut LoopContext<'_>) -> DispatchReport {
        let mut report = DispatchReport::default();

        for sub in &mut self.subscriptions {
            ctx.current = Some(sub.id);
            match sub.processor.on_tick(tick, ctx) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        processor = sub.processor.name(),
                        sequence = tick.sequence,
                        error = %err,
                        "loop processor failed"
                    );
                }
            }
        }
        ctx.current = None;

        for id in std::mem::take(&mut ctx.detach) {
            if self.unsubscribe(id).is_some() {
                report.detached += 1;
            }
        }

        report
    }
}

impl fmt::Debug for LoopObservable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopObservable")
            .field("subscribers", &self.names())
            .field("next_id", &self.next_id)
            .finish()
    }
}
