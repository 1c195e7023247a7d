use crate::{LoopContext, LoopProcessor, MoanCue, Result, Tick};

/// Plays an audio cue when the stroke speed climbs past one of the tuned
/// thresholds, at most once per cooldown window.
#[derive(Debug)]
pub struct MoanLoop {
    level: usize,
    since_last_ms: f64,
}

impl Default for MoanLoop {
    fn default() -> Self {
        Self {
            level: 0,
            since_last_ms: f64::INFINITY,
        }
    }
}

impl MoanLoop {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoopProcessor for MoanLoop {
    fn name(&self) -> &'static str {
        "moan"
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn on_tick(&mut self, tick: &Tick, ctx: &mut LoopContext<'_>) -> Result<()> {
        if ctx.interrupted() || ctx.session.current_media().is_none() {
            return Ok(());
        }

        self.since_last_ms += tick.delta_ms;
        let speed = ctx.session.stroke_speed();
        let level = ctx
            .tuning
            .moan_thresholds
            .iter()
            .take_while(|threshold| speed >= **threshold)
            .count();

        let rising = level > self.level;
        self.level = level;
        if !rising || self.since_last_ms < ctx.tuning.moan_cooldown_ms {
            return Ok(());
        }

        let cue = MoanCue::for_level(level - 1);
        if ctx.play(cue)? {
            tracing::trace!(?cue, speed, "moan cue played");
            self.since_last_ms = 0.0;
        }
        Ok(())
    }
}
