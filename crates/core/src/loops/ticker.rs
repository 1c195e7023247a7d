use crate::{LoopContext, LoopProcessor, Notification, Result, Tick};

/// Advances the playback position and flags the end of the current item.
#[derive(Debug, Default)]
pub struct Ticker;

impl Ticker {
    pub fn new() -> Self {
        Self
    }
}

impl LoopProcessor for Ticker {
    fn name(&self) -> &'static str {
        "ticker"
    }

    fn reset(&mut self) {}

    fn on_tick(&mut self, tick: &Tick, ctx: &mut LoopContext<'_>) -> Result<()> {
        if ctx.interrupted() || ctx.session.media_ended() {
            return Ok(());
        }
        let Some(duration) = ctx.session.current_media().map(|media| media.duration_ms) else {
            return Ok(());
        };

        let position = (ctx.session.playback_position_ms() + tick.delta_ms).clamp(0.0, duration);
        ctx.session.set_playback_position(position);

        if position >= duration {
            ctx.session.mark_media_ended();
            let id = ctx
                .session
                .current_media()
                .map(|media| media.id.clone())
                .unwrap_or_default();
            tracing::debug!(media = %id, position, "end of media");
            ctx.notify(Notification::info(format!("Finished playing {id}")));
        }
        Ok(())
    }
}
