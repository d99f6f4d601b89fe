//! Built-in configuration presets.
//!
//! Four tuning bundles covering the quality/performance spectrum, plus
//! best-effort hardware detection to pick one automatically.

use crate::config::{
    AudioAnalysisConfig, AudioAnalysisOverrides, Config, IdleAnimationConfig,
    IdleAnimationOverrides, SmoothingConfig, SmoothingOverrides,
};
use crate::error::ConfigError;

/// A named, described configuration bundle
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    pub config: Config,
}

/// Names accepted by [`builtin`], in recommendation order
pub const PRESET_NAMES: [&str; 4] = ["high-quality", "balanced", "performance", "mobile"];

/// Maximum fidelity. Desktop, recorded output.
pub fn high_quality() -> Preset {
    Preset {
        name: "high-quality",
        description: "Maximum fidelity with smooth animations",
        config: Config {
            audio: AudioAnalysisConfig {
                fft_size: 2048,
                smoothing_time_constant: 0.8,
                min_decibels: -90.0,
                max_decibels: -10.0,
                volume_threshold: 0.01,
                update_interval_ms: 16,
            },
            idle: IdleAnimationConfig {
                blink_interval_secs: (2.0, 6.0),
                blink_duration_secs: 0.15,
                breathing_speed_hz: 0.2,
                micro_movement_scale: 0.3,
                enable_idle_animations: true,
            },
            smoothing: SmoothingConfig {
                blend_shape_lerp: 0.15,
                volume_lerp: 0.2,
                enable_smoothing: true,
            },
        },
    }
}

/// Good quality at reasonable cost. The default recommendation.
pub fn balanced() -> Preset {
    Preset {
        name: "balanced",
        description: "Good quality with reasonable performance",
        config: Config {
            audio: AudioAnalysisConfig {
                fft_size: 1024,
                smoothing_time_constant: 0.7,
                min_decibels: -85.0,
                max_decibels: -10.0,
                volume_threshold: 0.015,
                update_interval_ms: 20,
            },
            idle: IdleAnimationConfig {
                blink_interval_secs: (3.0, 5.0),
                blink_duration_secs: 0.15,
                breathing_speed_hz: 0.15,
                micro_movement_scale: 0.2,
                enable_idle_animations: true,
            },
            smoothing: SmoothingConfig {
                blend_shape_lerp: 0.2,
                volume_lerp: 0.25,
                enable_smoothing: true,
            },
        },
    }
}

/// Lower latency, cheaper analysis. Multiple avatars, constrained CPUs.
pub fn performance() -> Preset {
    Preset {
        name: "performance",
        description: "Optimized for speed and low latency",
        config: Config {
            audio: AudioAnalysisConfig {
                fft_size: 512,
                smoothing_time_constant: 0.6,
                min_decibels: -80.0,
                max_decibels: -10.0,
                volume_threshold: 0.02,
                update_interval_ms: 33,
            },
            idle: IdleAnimationConfig {
                blink_interval_secs: (4.0, 7.0),
                blink_duration_secs: 0.12,
                breathing_speed_hz: 0.1,
                micro_movement_scale: 0.1,
                enable_idle_animations: true,
            },
            smoothing: SmoothingConfig {
                blend_shape_lerp: 0.3,
                volume_lerp: 0.35,
                enable_smoothing: true,
            },
        },
    }
}

/// Minimum footprint; idle animation disabled entirely.
pub fn mobile() -> Preset {
    Preset {
        name: "mobile",
        description: "Optimized for mobile devices",
        config: Config {
            audio: AudioAnalysisConfig {
                fft_size: 512,
                smoothing_time_constant: 0.5,
                min_decibels: -80.0,
                max_decibels: -10.0,
                volume_threshold: 0.025,
                update_interval_ms: 50,
            },
            idle: IdleAnimationConfig {
                blink_interval_secs: (5.0, 8.0),
                blink_duration_secs: 0.1,
                breathing_speed_hz: 0.08,
                micro_movement_scale: 0.05,
                enable_idle_animations: false,
            },
            smoothing: SmoothingConfig {
                blend_shape_lerp: 0.4,
                volume_lerp: 0.4,
                enable_smoothing: true,
            },
        },
    }
}

/// Look up a built-in preset by name
pub fn builtin(name: &str) -> Result<Preset, ConfigError> {
    match name {
        "high-quality" => Ok(high_quality()),
        "balanced" => Ok(balanced()),
        "performance" => Ok(performance()),
        "mobile" => Ok(mobile()),
        other => Err(ConfigError::UnknownPreset(other.to_string())),
    }
}

/// What we can cheaply learn about the host
#[derive(Debug, Clone, Default)]
pub struct DeviceHints {
    pub is_mobile: bool,
    pub memory_gb: Option<u64>,
    pub cores: Option<usize>,
}

impl DeviceHints {
    /// Detect hints for the current host
    pub fn detect() -> Self {
        let is_mobile = cfg!(any(target_os = "android", target_os = "ios"));
        let cores = std::thread::available_parallelism().map(|n| n.get()).ok();
        Self {
            is_mobile,
            memory_gb: None,
            cores,
        }
    }
}

/// Recommend a preset from device hints.
///
/// Mobile hosts get `mobile`; fewer than 4 cores or less than 4 GB gets
/// `performance`; everything else gets `balanced`. Unknown values count as
/// adequate.
pub fn recommend(hints: &DeviceHints) -> Preset {
    if hints.is_mobile {
        return mobile();
    }
    if hints.memory_gb.is_some_and(|gb| gb < 4) {
        return performance();
    }
    if hints.cores.is_some_and(|n| n < 4) {
        return performance();
    }
    balanced()
}

/// Partial tweaks layered over a preset base
#[derive(Debug, Clone, Default)]
pub struct PresetOverrides {
    pub audio: AudioAnalysisOverrides,
    pub idle: IdleAnimationOverrides,
    pub smoothing: SmoothingOverrides,
}

impl Preset {
    /// Derive a custom config from this preset plus partial overrides
    pub fn with_overrides(&self, overrides: &PresetOverrides) -> Config {
        let mut config = self.config.clone();
        overrides.audio.apply_to(&mut config.audio);
        overrides.idle.apply_to(&mut config.idle);
        overrides.smoothing.apply_to(&mut config.smoothing);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtins_validate() {
        for name in PRESET_NAMES {
            let preset = builtin(name).unwrap();
            assert_eq!(preset.name, name);
            assert!(
                preset.config.validate().is_ok(),
                "preset {name} failed validation"
            );
        }
    }

    #[test]
    fn test_unknown_preset_rejected() {
        assert!(matches!(
            builtin("ultra"),
            Err(ConfigError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_mobile_disables_idle() {
        assert!(!mobile().config.idle.enable_idle_animations);
        assert!(high_quality().config.idle.enable_idle_animations);
    }

    #[test]
    fn test_recommend_mobile_first() {
        let hints = DeviceHints {
            is_mobile: true,
            memory_gb: Some(16),
            cores: Some(16),
        };
        assert_eq!(recommend(&hints).name, "mobile");
    }

    #[test]
    fn test_recommend_constrained_hosts() {
        let low_mem = DeviceHints {
            is_mobile: false,
            memory_gb: Some(2),
            cores: Some(8),
        };
        assert_eq!(recommend(&low_mem).name, "performance");

        let few_cores = DeviceHints {
            is_mobile: false,
            memory_gb: None,
            cores: Some(2),
        };
        assert_eq!(recommend(&few_cores).name, "performance");
    }

    #[test]
    fn test_recommend_defaults_to_balanced() {
        assert_eq!(recommend(&DeviceHints::default()).name, "balanced");
    }

    #[test]
    fn test_overrides_layer_on_preset() {
        let overrides = PresetOverrides {
            audio: AudioAnalysisOverrides {
                fft_size: Some(2048),
                ..Default::default()
            },
            idle: IdleAnimationOverrides {
                micro_movement_scale: Some(0.5),
                ..Default::default()
            },
            ..Default::default()
        };

        let config = balanced().with_overrides(&overrides);
        assert_eq!(config.audio.fft_size, 2048);
        assert_eq!(config.idle.micro_movement_scale, 0.5);
        // Base values preserved where not overridden
        assert_eq!(config.audio.update_interval_ms, 20);
        assert_eq!(config.smoothing.blend_shape_lerp, 0.2);
    }
}
