use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::GameAction;

/// One scheduling cycle. Produced exclusively by a [`TickSource`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub sequence: u64,
    pub timestamp_ms: f64,
    /// Elapsed time since the previous tick. Never negative.
    pub delta_ms: f64,
}

/// The sole source of time for the engine. Sequence numbers strictly increase
/// and timestamps never go backwards, whatever the caller feeds in.
#[derive(Debug, Default, Clone)]
pub struct TickSource {
    next_sequence: u64,
    last_timestamp_ms: Option<f64>,
}

impl TickSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.next_sequence = 0;
        self.last_timestamp_ms = None;
    }

    /// Number of ticks produced since the last reset.
    pub fn produced(&self) -> u64 {
        self.next_sequence
    }

    /// Produces a tick that advances time by `delta_ms`. Negative or
    /// non-finite deltas are treated as zero.
    pub fn tick_by(&mut self, delta_ms: f64) -> Tick {
        let delta_ms = sanitize(delta_ms);
        let timestamp_ms = self.last_timestamp_ms.unwrap_or(0.0) + delta_ms;
        self.emit(timestamp_ms, delta_ms)
    }

    /// Produces a tick at an absolute timestamp. The first tick carries a zero
    /// delta; a timestamp earlier than the previous one is clamped to it.
    pub fn tick_at(&mut self, timestamp_ms: f64) -> Tick {
        match self.last_timestamp_ms {
            None => self.emit(sanitize(timestamp_ms), 0.0),
            Some(last) => {
                let timestamp_ms = if timestamp_ms.is_finite() {
                    timestamp_ms.max(last)
                } else {
                    last
                };
                self.emit(timestamp_ms, timestamp_ms - last)
            }
        }
    }

    fn emit(&mut self, timestamp_ms: f64, delta_ms: f64) -> Tick {
        let tick = Tick {
            sequence: self.next_sequence,
            timestamp_ms,
            delta_ms,
        };
        self.next_sequence += 1;
        self.last_timestamp_ms = Some(timestamp_ms);
        tick
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// Wall-clock pacing for real-time hosts. Sleeps until the next interval
/// boundary and reports the time that actually elapsed, so a late wakeup
/// yields a larger delta instead of drifting.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    started: Instant,
    last: Instant,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            interval,
            started: now,
            last: now,
        }
    }

    /// Blocks until the next interval boundary and returns milliseconds since
    /// the previous call.
    pub fn wait_next(&mut self) -> f64 {
        let deadline = self.last + self.interval;
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }

        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        elapsed.as_secs_f64() * 1_000.0
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// An action pinned to an offset within a media timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledAction {
    pub at_ms: f64,
    pub action: GameAction,
}

impl ScheduledAction {
    pub fn new(at_ms: f64, action: GameAction) -> Self {
        Self { at_ms, action }
    }
}

/// Walks a sorted action schedule, handing out each entry exactly once.
#[derive(Debug, Default, Clone)]
pub struct ActionCursor {
    actions: Vec<ScheduledAction>,
    next_action: usize,
}

impl ActionCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_actions(&mut self, actions: &[ScheduledAction]) {
        self.actions = actions.to_vec();
        self.actions.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));
        self.next_action = 0;
    }

    pub fn clear(&mut self) {
        self.actions.clear();
        self.next_action = 0;
    }

    pub fn remaining(&self) -> usize {
        self.actions.len() - self.next_action
    }

    /// Returns every not-yet-fired action scheduled at or before `position_ms`.
    pub fn due(&mut self, position_ms: f64) -> Vec<GameAction> {
        let mut fired = Vec::new();
        while let Some(entry) = self.actions.get(self.next_action) {
            if entry.at_ms > position_ms {
                break;
            }
            fired.push(entry.action.clone());
            self.next_action += 1;
        }
        fired
    }
}
