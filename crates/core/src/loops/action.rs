use crate::{ActionCursor, LoopContext, LoopProcessor, Result, Tick};

/// Fires the current item's scheduled actions as playback passes them. Each
/// action fires at most once per playback of an item.
#[derive(Debug, Default)]
pub struct ActionLoop {
    cursor: ActionCursor,
    generation: Option<u64>,
}

impl ActionLoop {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoopProcessor for ActionLoop {
    fn name(&self) -> &'static str {
        "action"
    }

    fn reset(&mut self) {
        self.cursor.clear();
        self.generation = None;
    }

    fn on_tick(&mut self, _tick: &Tick, ctx: &mut LoopContext<'_>) -> Result<()> {
        if ctx.interrupted() {
            return Ok(());
        }
        let Some(media) = ctx.session.current_media() else {
            return Ok(());
        };

        let generation = ctx.session.media_generation();
        if self.generation != Some(generation) {
            self.cursor.set_actions(&media.actions);
            self.generation = Some(generation);
        }

        for action in self.cursor.due(ctx.session.playback_position_ms()) {
            tracing::debug!(?action, "scheduled action fired");
            ctx.session.push_action(action);
        }
        Ok(())
    }
}
