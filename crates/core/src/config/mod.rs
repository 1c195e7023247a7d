use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, SyncError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub game: Configuration,
    pub tuning: EngineTuning,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.game.validate()?;
        self.tuning.validate()
    }
}

/// User-tunable options for a single game session. Read-only once the
/// session is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Configuration {
    /// Seconds between picture transitions. Only consumed by the host UI.
    pub slide_duration: u32,
    /// Gain applied to the intensity-to-speed transfer function.
    pub sensitivity: f64,
    /// Upper bound for the stroke speed, in strokes per second.
    pub speed_limit: f64,
    pub grip_enabled: bool,
}

pub const MIN_SLIDE_DURATION: u32 = 3;
pub const MAX_SLIDE_DURATION: u32 = 60;

impl Default for Configuration {
    fn default() -> Self {
        Self {
            slide_duration: 10,
            sensitivity: 1.0,
            speed_limit: 4.0,
            grip_enabled: false,
        }
    }
}

impl Configuration {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SLIDE_DURATION..=MAX_SLIDE_DURATION).contains(&self.slide_duration) {
            return Err(SyncError::InvalidConfig(format!(
                "slideDuration must be between {MIN_SLIDE_DURATION} and {MAX_SLIDE_DURATION} seconds, got {}",
                self.slide_duration
            )));
        }
        positive("sensitivity", self.sensitivity)?;
        positive("speedLimit", self.speed_limit)
    }
}

/// Engine constants that shape the loop processors. These are not exposed to
/// end users but can be overridden from the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineTuning {
    pub tick_interval_ms: u64,
    /// Largest stroke speed change allowed per elapsed millisecond.
    pub max_speed_delta_per_ms: f64,
    /// Time constant of the baseline moving average.
    pub baseline_smoothing_ms: f64,
    /// Fraction of the averaged speed that becomes the baseline floor.
    pub baseline_factor: f64,
    pub max_grip_delta_per_ms: f64,
    /// Grip applied at zero speed while grip is active.
    pub grip_floor: f64,
    /// Ascending stroke speeds that trigger a moan cue when crossed upwards.
    pub moan_thresholds: Vec<f64>,
    pub moan_cooldown_ms: f64,
    /// Smallest value change worth forwarding to the device.
    pub device_epsilon: f64,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            max_speed_delta_per_ms: 0.002,
            baseline_smoothing_ms: 5_000.0,
            baseline_factor: 0.5,
            max_grip_delta_per_ms: 0.001,
            grip_floor: 0.2,
            moan_thresholds: vec![1.5, 2.5, 3.5],
            moan_cooldown_ms: 4_000.0,
            device_epsilon: 0.01,
        }
    }
}

impl EngineTuning {
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "tickIntervalMs must be at least 1".to_string(),
            ));
        }
        positive("maxSpeedDeltaPerMs", self.max_speed_delta_per_ms)?;
        positive("baselineSmoothingMs", self.baseline_smoothing_ms)?;
        positive("maxGripDeltaPerMs", self.max_grip_delta_per_ms)?;
        unit("baselineFactor", self.baseline_factor)?;
        unit("gripFloor", self.grip_floor)?;
        non_negative("moanCooldownMs", self.moan_cooldown_ms)?;
        non_negative("deviceEpsilon", self.device_epsilon)?;
        for threshold in &self.moan_thresholds {
            non_negative("moanThresholds", *threshold)?;
        }
        if self.moan_thresholds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(SyncError::InvalidConfig(
                "moanThresholds must be strictly ascending".to_string(),
            ));
        }
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SyncError::InvalidConfig(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SyncError::InvalidConfig(format!(
            "{name} must be a finite, non-negative number, got {value}"
        )))
    }
}

fn unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SyncError::InvalidConfig(format!(
            "{name} must lie within [0, 1], got {value}"
        )))
    }
}
