//! Lipwave - Audio-driven avatar lip sync
//!
//! A real-time lip sync engine that:
//! - Analyses audio (microphone, WAV file, or caller-fed samples) with a
//!   rolling FFT
//! - Classifies each analysis frame into one of 14 viseme mouth shapes
//! - Smooths the resulting blend shape weights so the mouth never snaps
//! - Layers idle animation (blinking, breathing) on top when not speaking
//! - Writes the combined state into any mesh exposing named morph targets

pub mod audio;
pub mod avatar;
pub mod config;
pub mod debug;
pub mod engine;
pub mod error;
pub mod presets;
pub mod viseme;

pub use config::Config;
pub use engine::{LipSyncEngine, LipSyncState, SpeechFrame};
pub use error::{LipwaveError, Result};
pub use viseme::{VisemeCategory, VisemeWeights};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
