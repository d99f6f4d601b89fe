//! Exponential smoothing of viseme weights and volume.
//!
//! Targets jump whenever the classifier changes its mind; the smoother pulls
//! the displayed state toward the target by a fixed factor each tick so the
//! mouth never snaps. Factors are per-tick, so the effective time constant
//! scales with the analysis interval.

use crate::config::SmoothingConfig;
use crate::viseme::VisemeWeights;

/// Smoothed display state for the mouth
pub struct SmoothingEngine {
    config: SmoothingConfig,
    weights: VisemeWeights,
    volume: f32,
}

impl SmoothingEngine {
    pub fn new(config: SmoothingConfig) -> Self {
        Self {
            config,
            weights: VisemeWeights::NEUTRAL,
            volume: 0.0,
        }
    }

    /// Advance the displayed weights one tick toward `target`
    pub fn step_weights(&mut self, target: &VisemeWeights) -> VisemeWeights {
        if !self.config.enable_smoothing {
            self.weights = *target;
            return self.weights;
        }

        let r = self.config.blend_shape_lerp;
        for channel in crate::viseme::WeightChannel::ALL {
            let current = self.weights.channel(channel);
            let goal = target.channel(channel);
            self.weights.set_channel(channel, current + (goal - current) * r);
        }
        self.weights
    }

    /// Advance the displayed volume one tick toward `target`
    pub fn step_volume(&mut self, target: f32) -> f32 {
        if !self.config.enable_smoothing {
            self.volume = target;
            return self.volume;
        }
        self.volume += (target - self.volume) * self.config.volume_lerp;
        self.volume
    }

    pub fn weights(&self) -> &VisemeWeights {
        &self.weights
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Snap back to neutral, discarding smoothing history
    pub fn reset(&mut self) {
        self.weights = VisemeWeights::NEUTRAL;
        self.volume = 0.0;
    }
}
