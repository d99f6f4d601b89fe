//! Debug and diagnostics helpers.
//!
//! Nothing here affects animation output; these exist so a misbehaving setup
//! can be inspected after the fact: frame timing, viseme transition history,
//! raw audio capture, and a serialisable snapshot of the whole engine state.

use serde::Serialize;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Instant;

use crate::error::{LipwaveError, Result};
use crate::viseme::{VisemeCategory, VisemeWeights};

/// Rolling frame-rate and stage-timing monitor.
///
/// FPS is recomputed over one-second windows; stage timings hold the most
/// recent measurement.
pub struct PerformanceMonitor {
    frame_count: u32,
    window_start: Instant,
    fps: f32,
    analysis_ms: f32,
    render_ms: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub fps: f32,
    pub analysis_ms: f32,
    pub render_ms: f32,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            window_start: Instant::now(),
            fps: 0.0,
            analysis_ms: 0.0,
            render_ms: 0.0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Count one frame; closes the FPS window after a second has passed
    pub fn frame(&mut self) {
        self.frame_count += 1;
        let elapsed = self.window_start.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            self.fps = self.frame_count as f32 / elapsed;
            self.frame_count = 0;
            self.window_start = Instant::now();
        }
    }

    pub fn record_analysis_ms(&mut self, ms: f32) {
        self.analysis_ms = ms;
    }

    pub fn record_render_ms(&mut self, ms: f32) {
        self.render_ms = ms;
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        PerformanceMetrics {
            fps: self.fps,
            analysis_ms: self.analysis_ms,
            render_ms: self.render_ms,
        }
    }
}

/// One recorded viseme change
#[derive(Debug, Clone, Serialize)]
pub struct VisemeTransition {
    pub from: VisemeCategory,
    pub to: VisemeCategory,
    /// Seconds since the tracker was created
    pub at_secs: f32,
}

/// Bounded history of viseme changes.
///
/// Same-to-same "transitions" are ignored; the history keeps the most recent
/// `capacity` entries.
pub struct VisemeTransitionTracker {
    transitions: VecDeque<VisemeTransition>,
    capacity: usize,
    started: Instant,
}

impl VisemeTransitionTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            transitions: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            started: Instant::now(),
        }
    }

    pub fn track(&mut self, from: VisemeCategory, to: VisemeCategory) {
        if from == to {
            return;
        }
        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(VisemeTransition {
            from,
            to,
            at_secs: self.started.elapsed().as_secs_f32(),
        });
    }

    pub fn transitions(&self) -> impl Iterator<Item = &VisemeTransition> {
        self.transitions.iter()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Transitions per second over the recorded span; 0 with fewer than two
    /// entries
    pub fn average_rate(&self) -> f32 {
        if self.transitions.len() < 2 {
            return 0.0;
        }
        let first = self.transitions.front().map(|t| t.at_secs).unwrap_or(0.0);
        let last = self.transitions.back().map(|t| t.at_secs).unwrap_or(0.0);
        let span = last - first;
        if span <= 0.0 {
            return 0.0;
        }
        self.transitions.len() as f32 / span
    }

    pub fn export_json(&self) -> Result<String> {
        let entries: Vec<&VisemeTransition> = self.transitions.iter().collect();
        serde_json::to_string_pretty(&entries).map_err(|e| LipwaveError::Io(std::io::Error::other(e)))
    }

    pub fn clear(&mut self) {
        self.transitions.clear();
    }
}

/// Bounded ring of raw analysis windows, exportable as a WAV file for
/// listening back to what the analyser actually saw.
pub struct AudioBufferRecorder {
    frames: VecDeque<Vec<f32>>,
    capacity: usize,
    recording: bool,
}

impl AudioBufferRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            recording: false,
        }
    }

    pub fn start(&mut self) {
        self.recording = true;
        self.frames.clear();
    }

    pub fn stop(&mut self) {
        self.recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn record(&mut self, samples: &[f32]) {
        if !self.recording || samples.is_empty() {
            return;
        }
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(samples.to_vec());
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// All recorded samples, oldest first
    pub fn samples(&self) -> Vec<f32> {
        self.frames.iter().flatten().copied().collect()
    }

    /// Write the recorded audio as 16-bit mono PCM
    pub fn export_wav<P: AsRef<Path>>(&self, path: P, sample_rate: u32) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path.as_ref(), spec)
            .map_err(|e| LipwaveError::Io(std::io::Error::other(e)))?;

        for frame in &self.frames {
            for &sample in frame {
                let clamped = sample.clamp(-1.0, 1.0);
                let pcm = if clamped < 0.0 {
                    (clamped * 0x8000 as f32) as i16
                } else {
                    (clamped * 0x7fff as f32) as i16
                };
                writer
                    .write_sample(pcm)
                    .map_err(|e| LipwaveError::Io(std::io::Error::other(e)))?;
            }
        }

        writer
            .finalize()
            .map_err(|e| LipwaveError::Io(std::io::Error::other(e)))?;
        Ok(())
    }
}

/// Serialisable snapshot of the engine's externally visible state
#[derive(Debug, Clone, Serialize)]
pub struct DebugSnapshot {
    pub viseme: VisemeCategory,
    pub weights: VisemeWeights,
    pub volume: f32,
    pub is_speaking: bool,
    pub is_analyzing: bool,
    pub blink: f32,
    pub breathing: f32,
    pub spectrum: Vec<f32>,
    pub performance: PerformanceMetrics,
}

impl DebugSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| LipwaveError::Io(std::io::Error::other(e)))
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }
}
