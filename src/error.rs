//! Error types for Lipwave

use thiserror::Error;

/// Main error type for Lipwave
#[derive(Error, Debug)]
pub enum LipwaveError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio source and analysis errors
///
/// Apart from `SourceDisconnected`, everything here is an initialization-time
/// failure: once the analysis loop is running, bad input degrades to silence
/// instead of erroring.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio device found")]
    NoDeviceFound,

    #[error("Failed to enumerate audio devices: {0}")]
    DeviceEnumeration(String),

    #[error("Failed to get default input device")]
    NoDefaultInput,

    #[error("Failed to get default output device")]
    NoDefaultOutput,

    #[error("Failed to get supported config: {0}")]
    UnsupportedConfig(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuild(String),

    #[error("Failed to start audio stream: {0}")]
    StreamStart(String),

    #[error("Failed to decode audio file: {0}")]
    FileDecode(String),

    #[error("Audio source disconnected")]
    SourceDisconnected,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),
}

/// Result type alias for Lipwave operations
pub type Result<T> = std::result::Result<T, LipwaveError>;
