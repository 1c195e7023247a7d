//! Pure value mappings shared by the loop processors.

use serde::{Deserialize, Serialize};

use crate::{Configuration, StrokePattern};

/// Maps a sampled intensity in `[0, 1]` onto a stroke speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferFunction {
    pub sensitivity: f64,
    pub speed_limit: f64,
}

impl TransferFunction {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            sensitivity: config.sensitivity,
            speed_limit: config.speed_limit,
        }
    }

    /// Linear in intensity, scaled by sensitivity and the active pattern,
    /// clamped to `[0, speed_limit]`.
    pub fn speed_for(&self, intensity: f64, pattern: StrokePattern) -> f64 {
        let raw = intensity * self.sensitivity * self.speed_limit * pattern.multiplier();
        raw.clamp(0.0, self.speed_limit)
    }
}

/// Moves `current` towards `target` by at most `max_step`.
pub fn ramp(current: f64, target: f64, max_step: f64) -> f64 {
    let max_step = max_step.max(0.0);
    if (target - current).abs() <= max_step {
        return target;
    }
    current + (target - current).clamp(-max_step, max_step)
}

/// Exponential moving average step for an irregular sample interval.
pub fn smooth(current: f64, sample: f64, delta_ms: f64, time_constant_ms: f64) -> f64 {
    if time_constant_ms <= 0.0 {
        return sample;
    }
    let alpha = 1.0 - (-delta_ms / time_constant_ms).exp();
    current + (sample - current) * alpha
}

/// Grip tension for a speed: rises linearly from `floor` at rest to 1 at the
/// speed limit.
pub fn grip_for(speed: f64, speed_limit: f64, floor: f64) -> f64 {
    if speed_limit <= 0.0 {
        return floor.clamp(0.0, 1.0);
    }
    let ratio = (speed / speed_limit).clamp(0.0, 1.0);
    (floor + (1.0 - floor) * ratio).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    use super::*;

    #[test]
    fn transfer_scales_and_clamps() {
        let transfer = TransferFunction {
            sensitivity: 1.5,
            speed_limit: 4.0,
        };

        assert_relative_eq!(transfer.speed_for(0.5, StrokePattern::Steady), 3.0);
        assert_relative_eq!(transfer.speed_for(0.5, StrokePattern::Half), 1.5);
        assert_relative_eq!(transfer.speed_for(0.5, StrokePattern::Double), 4.0);
        assert_eq!(transfer.speed_for(1.0, StrokePattern::Pause), 0.0);
    }

    #[test]
    fn ramp_never_overshoots() {
        assert_eq!(ramp(0.0, 10.0, 2.5), 2.5);
        assert_eq!(ramp(9.0, 10.0, 2.5), 10.0);
        assert_eq!(ramp(5.0, 0.0, 1.0), 4.0);
        assert_eq!(ramp(5.0, 0.0, -1.0), 5.0);
    }

    #[test]
    fn smoothing_converges() {
        let mut value = 0.0;
        for _ in 0..1_000 {
            value = smooth(value, 2.0, 100.0, 1_000.0);
        }
        assert_abs_diff_eq!(value, 2.0, epsilon = 1e-6);
        assert_eq!(smooth(0.0, 2.0, 0.0, 1_000.0), 0.0);
    }

    #[test]
    fn grip_spans_floor_to_full() {
        assert_relative_eq!(grip_for(0.0, 4.0, 0.2), 0.2);
        assert_relative_eq!(grip_for(2.0, 4.0, 0.2), 0.6);
        assert_relative_eq!(grip_for(8.0, 4.0, 0.2), 1.0);
    }
}
