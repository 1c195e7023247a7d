use crate::mapping::{grip_for, ramp, smooth, TransferFunction};
use crate::{DeviceCommand, LoopContext, LoopProcessor, Result, Tick};

/// Samples the intensity curve at the playback position and publishes the
/// resulting stroke target.
#[derive(Debug, Default)]
pub struct StrokeEmitter {
    last_target: Option<f64>,
}

impl StrokeEmitter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoopProcessor for StrokeEmitter {
    fn name(&self) -> &'static str {
        "stroke-emitter"
    }

    fn reset(&mut self) {
        self.last_target = None;
    }

    fn on_tick(&mut self, _tick: &Tick, ctx: &mut LoopContext<'_>) -> Result<()> {
        if ctx.interrupted() {
            return Ok(());
        }
        let Some(media) = ctx.session.current_media() else {
            return Ok(());
        };

        let target = if ctx.session.media_ended() {
            0.0
        } else {
            let intensity = media.intensity.sample(ctx.session.playback_position_ms());
            TransferFunction::from_config(ctx.session.config())
                .speed_for(intensity, ctx.session.stroke_pattern())
        };

        if self.last_target != Some(target) {
            tracing::trace!(target, "stroke target changed");
            self.last_target = Some(target);
        }
        ctx.session.set_stroke_target(target);
        Ok(())
    }
}

/// Ramps the stroke speed towards its target, bounded per elapsed
/// millisecond, and forwards it to the device.
#[derive(Debug, Default)]
pub struct StrokeSpeedAdjustment;

impl StrokeSpeedAdjustment {
    pub fn new() -> Self {
        Self
    }
}

impl LoopProcessor for StrokeSpeedAdjustment {
    fn name(&self) -> &'static str {
        "stroke-speed-adjustment"
    }

    fn reset(&mut self) {}

    fn on_tick(&mut self, tick: &Tick, ctx: &mut LoopContext<'_>) -> Result<()> {
        if ctx.interrupted() || ctx.session.current_media().is_none() {
            return Ok(());
        }

        let session = &ctx.session;
        let target = session.stroke_target();
        // The baseline only lifts a moving target; a paused or finished
        // item must be able to come to rest.
        let desired = if target > 0.0 {
            target
                .max(session.stroke_speed_baseline())
                .min(session.config().speed_limit)
        } else {
            0.0
        };
        let max_step = ctx.tuning.max_speed_delta_per_ms * tick.delta_ms;
        let speed = ramp(session.stroke_speed(), desired, max_step);

        ctx.session.set_stroke_speed(speed);
        if speed == desired {
            ctx.send_settled(DeviceCommand::SetSpeed(speed));
        } else {
            ctx.send(DeviceCommand::SetSpeed(speed));
        }
        Ok(())
    }
}

/// Tracks a slow moving average of the stroke speed and publishes a fraction
/// of it as the floor for future targets.
#[derive(Debug, Default)]
pub struct StrokeSpeedBaselineAdjustment {
    average: f64,
}

impl StrokeSpeedBaselineAdjustment {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoopProcessor for StrokeSpeedBaselineAdjustment {
    fn name(&self) -> &'static str {
        "stroke-speed-baseline-adjustment"
    }

    fn reset(&mut self) {
        self.average = 0.0;
    }

    fn on_tick(&mut self, tick: &Tick, ctx: &mut LoopContext<'_>) -> Result<()> {
        if ctx.interrupted() || ctx.session.current_media().is_none() {
            return Ok(());
        }

        self.average = smooth(
            self.average,
            ctx.session.stroke_speed(),
            tick.delta_ms,
            ctx.tuning.baseline_smoothing_ms,
        );
        let baseline = self.average * ctx.tuning.baseline_factor;
        ctx.session.set_stroke_speed_baseline(baseline);
        Ok(())
    }
}

/// Derives grip tension from the stroke speed while grip output is active.
#[derive(Debug, Default)]
pub struct GripAdjustment;

impl GripAdjustment {
    pub fn new() -> Self {
        Self
    }
}

impl LoopProcessor for GripAdjustment {
    fn name(&self) -> &'static str {
        "grip-adjustment"
    }

    fn reset(&mut self) {}

    fn on_tick(&mut self, tick: &Tick, ctx: &mut LoopContext<'_>) -> Result<()> {
        if ctx.interrupted() || !ctx.session.grip_active() {
            return Ok(());
        }
        if ctx.session.current_media().is_none() {
            return Ok(());
        }

        let session = &ctx.session;
        let target = grip_for(
            session.stroke_speed(),
            session.config().speed_limit,
            ctx.tuning.grip_floor,
        );
        let max_step = ctx.tuning.max_grip_delta_per_ms * tick.delta_ms;
        let grip = ramp(session.grip(), target, max_step);

        ctx.session.set_grip(grip);
        if grip == target {
            ctx.send_settled(DeviceCommand::SetGrip(grip));
        } else {
            ctx.send(DeviceCommand::SetGrip(grip));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::loops::harness::LoopHarness;
    use crate::{Configuration, IntensityCurve, MediaDescriptor, StrokePattern};

    fn jumpy_media() -> MediaDescriptor {
        MediaDescriptor::new("jumpy", 20_000.0).with_intensity(IntensityCurve::from_pairs(&[
            (0.0, 0.0),
            (1.0, 1.0),
            (5_000.0, 1.0),
            (5_001.0, 0.0),
            (9_000.0, 0.0),
            (9_001.0, 0.8),
        ]))
    }

    #[test]
    fn emitter_maps_intensity_through_the_transfer_function() {
        let media =
            MediaDescriptor::new("flat", 1_000.0).with_intensity(IntensityCurve::constant(0.5));
        let mut harness = LoopHarness::with_media(media);
        let mut emitter = StrokeEmitter::new();

        harness.step(&mut emitter, 10.0);
        assert_relative_eq!(harness.session.stroke_target(), 2.0);

        harness.session.set_stroke_pattern(StrokePattern::Half);
        harness.step(&mut emitter, 10.0);
        assert_relative_eq!(harness.session.stroke_target(), 1.0);
    }

    #[test]
    fn emitter_targets_rest_once_media_ended() {
        let media =
            MediaDescriptor::new("flat", 1_000.0).with_intensity(IntensityCurve::constant(1.0));
        let mut harness = LoopHarness::with_media(media);
        harness.session.mark_media_ended();

        harness.step(&mut StrokeEmitter::new(), 10.0);

        assert_eq!(harness.session.stroke_target(), 0.0);
    }

    #[test]
    fn speed_changes_are_rate_limited() {
        let mut harness = LoopHarness::with_media(jumpy_media());
        let mut ticker = crate::loops::Ticker::new();
        let mut emitter = StrokeEmitter::new();
        let mut adjust = StrokeSpeedAdjustment::new();
        let mut baseline = StrokeSpeedBaselineAdjustment::new();
        let max_delta_per_ms = harness.tuning.max_speed_delta_per_ms;
        let deltas = [16.0, 0.0, 33.0, 250.0, 1.0, 100.0, 50.0];

        let mut previous = harness.session.stroke_speed();
        for step in 0..600 {
            let delta = deltas[step % deltas.len()];
            harness.step_all(
                &mut [&mut ticker, &mut emitter, &mut adjust, &mut baseline],
                delta,
            );
            let speed = harness.session.stroke_speed();
            assert!(
                (speed - previous).abs() <= max_delta_per_ms * delta + 1e-12,
                "step {step}: {previous} -> {speed} over {delta}ms"
            );
            previous = speed;
        }
    }

    #[test]
    fn speed_converges_to_target_and_reaches_device() {
        let media =
            MediaDescriptor::new("flat", 60_000.0).with_intensity(IntensityCurve::constant(0.5));
        let mut harness = LoopHarness::with_media(media);
        let mut emitter = StrokeEmitter::new();
        let mut adjust = StrokeSpeedAdjustment::new();

        for _ in 0..100 {
            harness.step_all(&mut [&mut emitter, &mut adjust], 50.0);
        }

        assert_relative_eq!(harness.session.stroke_speed(), 2.0);
        let last = harness.device.commands().last().copied();
        assert_eq!(last, Some(DeviceCommand::SetSpeed(2.0)));
    }

    #[test]
    fn device_lands_exactly_on_target_with_small_ticks() {
        let media =
            MediaDescriptor::new("flat", 60_000.0).with_intensity(IntensityCurve::constant(0.5));
        let mut harness = LoopHarness::with_media(media);
        let mut emitter = StrokeEmitter::new();
        let mut adjust = StrokeSpeedAdjustment::new();
        let last_speed = |harness: &LoopHarness| {
            harness
                .device
                .commands()
                .iter()
                .rev()
                .find_map(|command| match command {
                    DeviceCommand::SetSpeed(speed) => Some(*speed),
                    _ => None,
                })
        };

        for _ in 0..500 {
            harness.step_all(&mut [&mut emitter, &mut adjust], 3.0);
        }
        assert_eq!(harness.session.stroke_speed(), 2.0);
        assert_eq!(last_speed(&harness), Some(2.0));

        harness.session.set_stroke_pattern(StrokePattern::Pause);
        for _ in 0..500 {
            harness.step_all(&mut [&mut emitter, &mut adjust], 3.0);
        }
        assert_eq!(harness.session.stroke_speed(), 0.0);
        assert_eq!(last_speed(&harness), Some(0.0));
    }

    #[test]
    fn baseline_follows_speed_slowly() {
        let media =
            MediaDescriptor::new("flat", 60_000.0).with_intensity(IntensityCurve::constant(1.0));
        let mut harness = LoopHarness::with_media(media);
        let mut emitter = StrokeEmitter::new();
        let mut adjust = StrokeSpeedAdjustment::new();
        let mut baseline = StrokeSpeedBaselineAdjustment::new();

        for _ in 0..40 {
            harness.step_all(&mut [&mut emitter, &mut adjust, &mut baseline], 50.0);
        }
        let early = harness.session.stroke_speed_baseline();
        assert!(early > 0.0);
        assert!(early < harness.session.stroke_speed() * harness.tuning.baseline_factor);

        baseline.reset();
        assert_eq!(baseline.average, 0.0);
    }

    #[test]
    fn baseline_does_not_hold_a_paused_stroke() {
        let media =
            MediaDescriptor::new("flat", 60_000.0).with_intensity(IntensityCurve::constant(1.0));
        let mut harness = LoopHarness::with_media(media);
        let mut emitter = StrokeEmitter::new();
        let mut adjust = StrokeSpeedAdjustment::new();
        harness.session.set_stroke_speed_baseline(1.0);
        harness.session.set_stroke_pattern(StrokePattern::Pause);

        harness.session.set_stroke_speed(0.05);
        harness.step_all(&mut [&mut emitter, &mut adjust], 100.0);

        assert_eq!(harness.session.stroke_speed(), 0.0);
    }

    #[test]
    fn grip_is_idle_until_activated() {
        let config = Configuration {
            grip_enabled: true,
            ..Default::default()
        };
        let mut harness = LoopHarness::new(config);
        harness
            .session
            .load_media(Some(MediaDescriptor::new("clip", 10_000.0)));
        harness.session.set_stroke_speed(4.0);
        let mut grip = GripAdjustment::new();

        harness.step(&mut grip, 100.0);
        assert_eq!(harness.session.grip(), 0.0);

        harness.session.set_grip_active(true);
        harness.step(&mut grip, 100.0);
        assert_relative_eq!(harness.session.grip(), 0.1);
        assert_eq!(
            harness.device.commands(),
            vec![DeviceCommand::SetGrip(harness.session.grip())]
        );

        for _ in 0..20 {
            harness.step(&mut grip, 100.0);
        }
        assert_relative_eq!(harness.session.grip(), 1.0);
    }

    #[test]
    fn interrupted_adjustment_sends_nothing() {
        let media =
            MediaDescriptor::new("flat", 60_000.0).with_intensity(IntensityCurve::constant(1.0));
        let mut harness = LoopHarness::with_media(media);
        harness.session.set_stroke_target(4.0);
        harness.interrupt.raise();

        harness.step(&mut StrokeSpeedAdjustment::new(), 100.0);

        assert_eq!(harness.session.stroke_speed(), 0.0);
        assert!(harness.device.commands().is_empty());
    }
}
