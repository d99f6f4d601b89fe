//! Idle animation: periodic blinks and a breathing oscillator.
//!
//! Runs on wall-clock time fed by the render side, independent of the audio
//! analysis tick, so blinks stay smooth even when analysis stalls.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::IdleAnimationConfig;

/// Where a blink currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkPhase {
    /// Eyes open, waiting for the next scheduled blink
    Idle,
    /// Lids moving down
    Closing,
    /// Lids moving back up
    Opening,
}

/// Drives blink and breathing values from elapsed time.
///
/// `advance(dt)` moves the animation forward; [`blink`](Self::blink) is 0.0
/// (open) to 1.0 (closed), [`breathing`](Self::breathing) oscillates in
/// [0, 1] at the configured rate.
pub struct IdleAnimationController {
    config: IdleAnimationConfig,
    rng: SmallRng,
    phase: BlinkPhase,
    /// Seconds until the next blink starts (only meaningful in `Idle`)
    next_blink_in: f32,
    /// Seconds spent in the current closing/opening phase
    phase_elapsed: f32,
    blink: f32,
    clock: f32,
}

impl IdleAnimationController {
    pub fn new(config: IdleAnimationConfig) -> Self {
        Self::with_rng(config, SmallRng::from_entropy())
    }

    /// Deterministic construction for tests
    pub fn with_rng_seed(config: IdleAnimationConfig, seed: u64) -> Self {
        Self::with_rng(config, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(config: IdleAnimationConfig, mut rng: SmallRng) -> Self {
        let next_blink_in = draw_interval(&config, &mut rng);
        Self {
            config,
            rng,
            phase: BlinkPhase::Idle,
            next_blink_in,
            phase_elapsed: 0.0,
            blink: 0.0,
            clock: 0.0,
        }
    }

    /// Advance the animation by `dt` seconds
    pub fn advance(&mut self, dt: f32) {
        if !self.config.enable_idle_animations {
            // Disabled mid-blink leaves the eyes open, not half-shut
            self.phase = BlinkPhase::Idle;
            self.blink = 0.0;
            return;
        }

        self.clock += dt;
        let half = (self.config.blink_duration_secs / 2.0).max(1e-3);

        match self.phase {
            BlinkPhase::Idle => {
                self.next_blink_in -= dt;
                if self.next_blink_in <= 0.0 {
                    self.phase = BlinkPhase::Closing;
                    self.phase_elapsed = 0.0;
                }
            }
            BlinkPhase::Closing => {
                self.phase_elapsed += dt;
                self.blink = (self.phase_elapsed / half).min(1.0);
                if self.phase_elapsed >= half {
                    self.phase = BlinkPhase::Opening;
                    self.phase_elapsed = 0.0;
                }
            }
            BlinkPhase::Opening => {
                self.phase_elapsed += dt;
                self.blink = (1.0 - self.phase_elapsed / half).max(0.0);
                if self.phase_elapsed >= half {
                    self.phase = BlinkPhase::Idle;
                    self.blink = 0.0;
                    self.next_blink_in = draw_interval(&self.config, &mut self.rng);
                }
            }
        }
    }

    /// Current eyelid closure in [0, 1]
    pub fn blink(&self) -> f32 {
        self.blink
    }

    /// Current breathing cycle position in [0, 1]
    pub fn breathing(&self) -> f32 {
        if !self.config.enable_idle_animations {
            return 0.0;
        }
        let phase = 2.0 * std::f32::consts::PI * self.config.breathing_speed_hz * self.clock;
        (phase.sin() + 1.0) / 2.0
    }

    pub fn phase(&self) -> BlinkPhase {
        self.phase
    }

    /// Subtle-motion multiplier applied on top of breathing
    pub fn micro_movement_scale(&self) -> f32 {
        self.config.micro_movement_scale
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enable_idle_animations = enabled;
        if !enabled {
            self.phase = BlinkPhase::Idle;
            self.blink = 0.0;
        }
    }
}

fn draw_interval(config: &IdleAnimationConfig, rng: &mut SmallRng) -> f32 {
    let (min, max) = config.blink_interval_secs;
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}
