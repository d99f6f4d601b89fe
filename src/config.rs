//! Configuration parsing and management for Lipwave

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConfigError, LipwaveError};

/// Main configuration structure
///
/// Three independently overridable sections, mirrored by the preset bundles
/// in [`crate::presets`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioAnalysisConfig,
    pub idle: IdleAnimationConfig,
    pub smoothing: SmoothingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioAnalysisConfig::default(),
            idle: IdleAnimationConfig::default(),
            smoothing: SmoothingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LipwaveError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e)))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(s: &str) -> Result<Self, LipwaveError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), LipwaveError> {
        self.audio.validate()?;
        self.idle.validate()?;
        self.smoothing.validate()?;
        Ok(())
    }

    /// Return a copy with all lerp rates and scales clamped into range.
    ///
    /// Out-of-range rates are a tuning mistake, not a hard error, so they are
    /// clamped at activation time rather than rejected.
    pub fn clamped(mut self) -> Self {
        self.smoothing.blend_shape_lerp = self.smoothing.blend_shape_lerp.clamp(0.0, 1.0);
        self.smoothing.volume_lerp = self.smoothing.volume_lerp.clamp(0.0, 1.0);
        self.idle.micro_movement_scale = self.idle.micro_movement_scale.clamp(0.0, 1.0);
        self.audio.smoothing_time_constant = self.audio.smoothing_time_constant.clamp(0.0, 1.0);
        self.audio.volume_threshold = self.audio.volume_threshold.clamp(0.0, 1.0);
        self
    }
}

/// Audio analysis configuration
///
/// Controls the frequency-analysis window and the fixed-interval analysis
/// loop cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioAnalysisConfig {
    /// FFT window size in samples (power of two)
    pub fft_size: usize,
    /// Per-bin exponential averaging factor for the spectrum (0.0 - 1.0)
    pub smoothing_time_constant: f32,
    /// Floor of the magnitude range in dB
    pub min_decibels: f32,
    /// Ceiling of the magnitude range in dB
    pub max_decibels: f32,
    /// Smoothed volume above this is treated as speech (0.0 - 1.0)
    pub volume_threshold: f32,
    /// Analysis loop interval in milliseconds
    pub update_interval_ms: u64,
}

impl Default for AudioAnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing_time_constant: 0.8,
            min_decibels: -90.0,
            max_decibels: -10.0,
            volume_threshold: 0.01,
            update_interval_ms: 16,
        }
    }
}

impl AudioAnalysisConfig {
    pub fn validate(&self) -> Result<(), LipwaveError> {
        if !self.fft_size.is_power_of_two() || self.fft_size < 32 {
            return Err(ConfigError::InvalidValue {
                field: "audio.fft_size".to_string(),
                message: "FFT size must be a power of two >= 32".to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(ConfigError::InvalidValue {
                field: "audio.smoothing_time_constant".to_string(),
                message: "Must be between 0.0 and 1.0".to_string(),
            }
            .into());
        }
        if self.min_decibels >= self.max_decibels {
            return Err(ConfigError::InvalidValue {
                field: "audio.min_decibels".to_string(),
                message: "min_decibels must be below max_decibels".to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.volume_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "audio.volume_threshold".to_string(),
                message: "Must be between 0.0 and 1.0".to_string(),
            }
            .into());
        }
        if self.update_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "audio.update_interval_ms".to_string(),
                message: "Update interval must be greater than 0".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Number of frequency bins produced per analysis frame
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

/// Idle animation (blink + breathing) configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleAnimationConfig {
    /// Minimum and maximum seconds between blinks
    pub blink_interval_secs: (f32, f32),
    /// Total duration of a blink (close + open) in seconds
    pub blink_duration_secs: f32,
    /// Breathing cycles per second
    pub breathing_speed_hz: f32,
    /// Scale of breathing-driven jaw micro-movement (0.0 - 1.0)
    pub micro_movement_scale: f32,
    /// Master switch; when false, blink and breathing outputs are pinned to 0
    pub enable_idle_animations: bool,
}

impl Default for IdleAnimationConfig {
    fn default() -> Self {
        Self {
            blink_interval_secs: (2.0, 6.0),
            blink_duration_secs: 0.15,
            breathing_speed_hz: 0.2,
            micro_movement_scale: 0.3,
            enable_idle_animations: true,
        }
    }
}

impl IdleAnimationConfig {
    pub fn validate(&self) -> Result<(), LipwaveError> {
        let (min, max) = self.blink_interval_secs;
        if min < 0.0 || min > max {
            return Err(ConfigError::InvalidValue {
                field: "idle.blink_interval_secs".to_string(),
                message: "Interval must satisfy 0 <= min <= max".to_string(),
            }
            .into());
        }
        if self.blink_duration_secs <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "idle.blink_duration_secs".to_string(),
                message: "Blink duration must be greater than 0".to_string(),
            }
            .into());
        }
        if self.breathing_speed_hz <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "idle.breathing_speed_hz".to_string(),
                message: "Breathing speed must be greater than 0".to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.micro_movement_scale) {
            return Err(ConfigError::InvalidValue {
                field: "idle.micro_movement_scale".to_string(),
                message: "Must be between 0.0 and 1.0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Weight/volume smoothing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Per-tick lerp rate for blend shape weights (0.0 - 1.0)
    pub blend_shape_lerp: f32,
    /// Per-tick lerp rate for volume (0.0 - 1.0)
    pub volume_lerp: f32,
    /// When false, weights snap straight to the classified target
    pub enable_smoothing: bool,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            blend_shape_lerp: 0.15,
            volume_lerp: 0.2,
            enable_smoothing: true,
        }
    }
}

impl SmoothingConfig {
    pub fn validate(&self) -> Result<(), LipwaveError> {
        for (field, value) in [
            ("smoothing.blend_shape_lerp", self.blend_shape_lerp),
            ("smoothing.volume_lerp", self.volume_lerp),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Lerp rate must be between 0.0 and 1.0".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Partial override of [`AudioAnalysisConfig`]; unset fields keep the base value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioAnalysisOverrides {
    pub fft_size: Option<usize>,
    pub smoothing_time_constant: Option<f32>,
    pub min_decibels: Option<f32>,
    pub max_decibels: Option<f32>,
    pub volume_threshold: Option<f32>,
    pub update_interval_ms: Option<u64>,
}

impl AudioAnalysisOverrides {
    pub fn apply_to(&self, base: &mut AudioAnalysisConfig) {
        if let Some(v) = self.fft_size {
            base.fft_size = v;
        }
        if let Some(v) = self.smoothing_time_constant {
            base.smoothing_time_constant = v;
        }
        if let Some(v) = self.min_decibels {
            base.min_decibels = v;
        }
        if let Some(v) = self.max_decibels {
            base.max_decibels = v;
        }
        if let Some(v) = self.volume_threshold {
            base.volume_threshold = v;
        }
        if let Some(v) = self.update_interval_ms {
            base.update_interval_ms = v;
        }
    }
}

/// Partial override of [`IdleAnimationConfig`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleAnimationOverrides {
    pub blink_interval_secs: Option<(f32, f32)>,
    pub blink_duration_secs: Option<f32>,
    pub breathing_speed_hz: Option<f32>,
    pub micro_movement_scale: Option<f32>,
    pub enable_idle_animations: Option<bool>,
}

impl IdleAnimationOverrides {
    pub fn apply_to(&self, base: &mut IdleAnimationConfig) {
        if let Some(v) = self.blink_interval_secs {
            base.blink_interval_secs = v;
        }
        if let Some(v) = self.blink_duration_secs {
            base.blink_duration_secs = v;
        }
        if let Some(v) = self.breathing_speed_hz {
            base.breathing_speed_hz = v;
        }
        if let Some(v) = self.micro_movement_scale {
            base.micro_movement_scale = v;
        }
        if let Some(v) = self.enable_idle_animations {
            base.enable_idle_animations = v;
        }
    }
}

/// Partial override of [`SmoothingConfig`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingOverrides {
    pub blend_shape_lerp: Option<f32>,
    pub volume_lerp: Option<f32>,
    pub enable_smoothing: Option<bool>,
}

impl SmoothingOverrides {
    pub fn apply_to(&self, base: &mut SmoothingConfig) {
        if let Some(v) = self.blend_shape_lerp {
            base.blend_shape_lerp = v;
        }
        if let Some(v) = self.volume_lerp {
            base.volume_lerp = v;
        }
        if let Some(v) = self.enable_smoothing {
            base.enable_smoothing = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.audio.fft_size, 2048);
        assert_eq!(config.audio.update_interval_ms, 16);
        assert!(config.idle.enable_idle_animations);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [audio]
            fft_size = 1024
            update_interval_ms = 33

            [smoothing]
            blend_shape_lerp = 0.3
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.audio.fft_size, 1024);
        assert_eq!(config.audio.update_interval_ms, 33);
        assert_eq!(config.smoothing.blend_shape_lerp, 0.3);
        // Untouched sections keep defaults
        assert_eq!(config.idle.blink_duration_secs, 0.15);
    }

    #[test]
    fn test_fft_size_must_be_power_of_two() {
        let mut config = Config::default();
        config.audio.fft_size = 1000;
        assert!(config.validate().is_err());

        config.audio.fft_size = 512;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_decibel_range_ordering() {
        let mut config = Config::default();
        config.audio.min_decibels = -10.0;
        config.audio.max_decibels = -90.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blink_interval_ordering() {
        let mut config = Config::default();
        config.idle.blink_interval_secs = (6.0, 2.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_update_interval_rejected() {
        let mut config = Config::default();
        config.audio.update_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamped_rates() {
        let mut config = Config::default();
        config.smoothing.blend_shape_lerp = 1.7;
        config.smoothing.volume_lerp = -0.2;
        config.idle.micro_movement_scale = 2.0;

        let clamped = config.clamped();
        assert_eq!(clamped.smoothing.blend_shape_lerp, 1.0);
        assert_eq!(clamped.smoothing.volume_lerp, 0.0);
        assert_eq!(clamped.idle.micro_movement_scale, 1.0);
    }

    #[test]
    fn test_overrides_shallow_merge() {
        let mut audio = AudioAnalysisConfig::default();
        let overrides = AudioAnalysisOverrides {
            fft_size: Some(512),
            ..Default::default()
        };
        overrides.apply_to(&mut audio);
        assert_eq!(audio.fft_size, 512);
        // Everything else untouched
        assert_eq!(audio.update_interval_ms, 16);
        assert_eq!(audio.min_decibels, -90.0);
    }
}
