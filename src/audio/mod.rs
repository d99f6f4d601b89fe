//! Audio sources and analysis.
//!
//! Three source kinds feed the analyser: live capture from an input device,
//! WAV file playback (with an analysis tap), and an in-process sample feed
//! used by embedders and tests. All three hand out mono f32 batches through
//! a crossbeam receiver.

pub mod analyzer;
pub mod capture;
pub mod playback;

pub use analyzer::{compute_volume, AnalysisFrame, SpectrumAnalyzer};
pub use capture::{default_input_device_name, list_input_devices, CaptureSource};
pub use playback::PlaybackSource;

use crossbeam_channel::Receiver;
use std::path::PathBuf;

use crate::error::AudioError;

/// Where the engine gets its samples from
#[derive(Debug, Clone)]
pub enum AudioInput {
    /// Named input device; "default" selects the system default
    Device(String),
    /// WAV file played through the default output device
    File(PathBuf),
    /// Caller-supplied mono samples at the given rate
    Feed(Receiver<Vec<f32>>, u32),
}

impl Default for AudioInput {
    fn default() -> Self {
        AudioInput::Device("default".to_string())
    }
}

/// An opened audio source. Dropping the handle stops the underlying stream.
pub enum SourceHandle {
    Capture(CaptureSource),
    Playback(PlaybackSource),
    Feed(Receiver<Vec<f32>>, u32),
}

impl SourceHandle {
    pub fn open(input: &AudioInput) -> Result<Self, AudioError> {
        match input {
            AudioInput::Device(name) => Ok(SourceHandle::Capture(CaptureSource::open(name)?)),
            AudioInput::File(path) => Ok(SourceHandle::Playback(PlaybackSource::open(path)?)),
            AudioInput::Feed(rx, rate) => Ok(SourceHandle::Feed(rx.clone(), *rate)),
        }
    }

    pub fn samples(&self) -> &Receiver<Vec<f32>> {
        match self {
            SourceHandle::Capture(c) => c.samples(),
            SourceHandle::Playback(p) => p.samples(),
            SourceHandle::Feed(rx, _) => rx,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        match self {
            SourceHandle::Capture(c) => c.sample_rate(),
            SourceHandle::Playback(p) => p.sample_rate(),
            SourceHandle::Feed(_, rate) => *rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_feed_source_passes_samples_through() {
        let (tx, rx) = bounded(4);
        let handle = SourceHandle::open(&AudioInput::Feed(rx, 48_000)).unwrap();

        tx.send(vec![0.1, 0.2]).unwrap();
        assert_eq!(handle.sample_rate(), 48_000);
        assert_eq!(handle.samples().recv().unwrap(), vec![0.1, 0.2]);
    }

    #[test]
    fn test_default_input_is_default_device() {
        match AudioInput::default() {
            AudioInput::Device(name) => assert_eq!(name, "default"),
            other => panic!("unexpected default input: {other:?}"),
        }
    }
}
