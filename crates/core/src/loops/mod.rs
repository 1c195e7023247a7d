//! Loop processors driven by the [`LoopObservable`](crate::LoopObservable).
//!
//! Every processor checks the interrupt first and returns without side
//! effects while it is raised. Processors that need the current media item
//! do nothing for ticks where there is none.

mod action;
mod moan;
mod stroke;
mod ticker;

pub use action::ActionLoop;
pub use moan::MoanLoop;
pub use stroke::{
    GripAdjustment, StrokeEmitter, StrokeSpeedAdjustment, StrokeSpeedBaselineAdjustment,
};
pub use ticker::Ticker;

use crate::LoopProcessor;

/// The game's processors in dispatch order. The ticker runs first so every
/// later processor reads the position for the current tick, and the stroke
/// emitter runs before the speed and grip adjustments that consume its output.
pub fn game_loops() -> Vec<Box<dyn LoopProcessor>> {
    vec![
        Box::new(Ticker::new()),
        Box::new(ActionLoop::new()),
        Box::new(StrokeEmitter::new()),
        Box::new(StrokeSpeedAdjustment::new()),
        Box::new(StrokeSpeedBaselineAdjustment::new()),
        Box::new(GripAdjustment::new()),
        Box::new(MoanLoop::new()),
    ]
}
