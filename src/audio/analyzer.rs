//! Frequency/time-domain analysis over a rolling sample window.

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;

use crate::config::AudioAnalysisConfig;

/// RMS is multiplied by this before clamping to [0, 1]; speech at normal
/// levels otherwise barely registers.
const VOLUME_SENSITIVITY: f32 = 2.0;

/// One analysis frame: normalized spectrum, raw window samples, RMS volume
#[derive(Debug, Clone)]
pub struct AnalysisFrame {
    /// Per-bin magnitudes normalized to [0, 1] over the configured dB range
    pub spectrum: Vec<f32>,
    /// The time-domain window the frame was computed from (most recent last)
    pub samples: Vec<f32>,
    /// Raw (unsmoothed) volume in [0, 1]
    pub volume: f32,
}

/// Rolling spectral analyser.
///
/// Keeps the most recent `fft_size` samples; each [`analyze`](Self::analyze)
/// computes RMS volume and a Hann-windowed magnitude spectrum, clamps it to
/// the configured decibel range and normalizes to [0, 1], with per-bin
/// exponential averaging controlled by `smoothing_time_constant`.
pub struct SpectrumAnalyzer {
    fft_size: usize,
    min_db: f32,
    max_db: f32,
    tau: f32,
    ring: VecDeque<f32>,
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    fft_input: Vec<f32>,
    fft_output: Vec<Complex32>,
    smoothed_mags: Vec<f32>,
}

impl SpectrumAnalyzer {
    pub fn new(config: &AudioAnalysisConfig) -> Self {
        let fft_size = config.fft_size;
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        let window: Vec<f32> = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / fft_size as f32).cos()))
            .collect();

        Self {
            fft_size,
            min_db: config.min_decibels,
            max_db: config.max_decibels,
            tau: config.smoothing_time_constant.clamp(0.0, 1.0),
            ring: VecDeque::with_capacity(fft_size),
            window,
            fft_input: fft.make_input_vec(),
            fft_output: fft.make_output_vec(),
            fft,
            smoothed_mags: vec![0.0; fft_size / 2],
        }
    }

    /// Append captured samples, keeping only the latest `fft_size`
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &s in samples {
            if self.ring.len() == self.fft_size {
                self.ring.pop_front();
            }
            self.ring.push_back(s);
        }
    }

    /// Analyse the current window.
    ///
    /// An empty window degrades to volume 0 and a decaying spectrum; this
    /// never errors and never divides by zero.
    pub fn analyze(&mut self) -> AnalysisFrame {
        let samples: Vec<f32> = self.ring.iter().copied().collect();

        let volume = compute_volume(&samples);

        // Zero-pad the front when the window is not yet full
        self.fft_input.fill(0.0);
        let offset = self.fft_size - samples.len();
        for (i, &s) in samples.iter().enumerate() {
            self.fft_input[offset + i] = s * self.window[offset + i];
        }

        // realfft only fails on length mismatches, which we size out above
        if self
            .fft
            .process(&mut self.fft_input, &mut self.fft_output)
            .is_err()
        {
            return AnalysisFrame {
                spectrum: vec![0.0; self.fft_size / 2],
                samples,
                volume,
            };
        }

        let scale = 2.0 / self.fft_size as f32;
        for (i, smoothed) in self.smoothed_mags.iter_mut().enumerate() {
            let mag = self.fft_output[i].norm() * scale;
            *smoothed = self.tau * *smoothed + (1.0 - self.tau) * mag;
        }

        let db_range = self.max_db - self.min_db;
        let spectrum: Vec<f32> = self
            .smoothed_mags
            .iter()
            .map(|&mag| {
                let db = 20.0 * mag.max(1e-12).log10();
                ((db - self.min_db) / db_range).clamp(0.0, 1.0)
            })
            .collect();

        AnalysisFrame {
            spectrum,
            samples,
            volume,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

/// RMS volume of a sample window, scaled and clamped to [0, 1].
///
/// Computed against the window mean so a DC offset (a constant, deviation-free
/// signal) counts as silence. Empty windows yield 0.
pub fn compute_volume(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean: f32 = samples.iter().sum::<f32>() / samples.len() as f32;
    let sum_sq: f32 = samples.iter().map(|s| (s - mean) * (s - mean)).sum();
    let rms = (sum_sq / samples.len() as f32).sqrt();
    (rms * VOLUME_SENSITIVITY).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer(fft_size: usize) -> SpectrumAnalyzer {
        SpectrumAnalyzer::new(&AudioAnalysisConfig {
            fft_size,
            smoothing_time_constant: 0.0,
            ..AudioAnalysisConfig::default()
        })
    }

    #[test]
    fn test_empty_window_is_silent() {
        let mut a = analyzer(256);
        let frame = a.analyze();
        assert_eq!(frame.volume, 0.0);
        assert_eq!(frame.spectrum.len(), 128);
        assert!(frame.samples.is_empty());
    }

    #[test]
    fn test_constant_signal_has_zero_deviation_volume() {
        // A flat mid-scale signal has no AC energy; DC offset must not
        // register as loudness
        let mut a = analyzer(256);
        a.push_samples(&vec![0.5; 256]);
        let frame = a.analyze();
        assert_eq!(frame.volume, 0.0);

        a.push_samples(&vec![0.0; 256]);
        assert_eq!(a.analyze().volume, 0.0);
    }

    #[test]
    fn test_loud_sine_registers_volume() {
        let mut a = analyzer(512);
        let sine: Vec<f32> = (0..512)
            .map(|i| (2.0 * PI * i as f32 * 8.0 / 512.0).sin() * 0.5)
            .collect();
        a.push_samples(&sine);
        let frame = a.analyze();
        // RMS of a 0.5-amplitude sine is ~0.354; scaled by 2 -> ~0.707
        assert!(
            (frame.volume - 0.707).abs() < 0.02,
            "unexpected volume {}",
            frame.volume
        );
    }

    #[test]
    fn test_low_sine_concentrates_energy_in_low_bins() {
        let mut a = analyzer(512);
        // 2 cycles over the window -> bin 2
        let sine: Vec<f32> = (0..512)
            .map(|i| (2.0 * PI * i as f32 * 2.0 / 512.0).sin())
            .collect();
        a.push_samples(&sine);
        let frame = a.analyze();

        let peak_bin = frame
            .spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert!(peak_bin <= 4, "expected low-bin peak, got bin {peak_bin}");
    }

    #[test]
    fn test_ring_keeps_latest_window() {
        let mut a = analyzer(64);
        a.push_samples(&vec![0.0; 64]);
        a.push_samples(&vec![0.5; 64]);
        let frame = a.analyze();
        assert_eq!(frame.samples.len(), 64);
        assert!(frame.samples.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_spectrum_normalized_range() {
        let mut a = analyzer(256);
        let noise: Vec<f32> = (0..256).map(|i| ((i * 7919) % 200) as f32 / 100.0 - 1.0).collect();
        a.push_samples(&noise);
        let frame = a.analyze();
        assert!(frame.spectrum.iter().all(|&m| (0.0..=1.0).contains(&m)));
    }

    #[test]
    fn test_volume_clamped_to_one() {
        assert_eq!(compute_volume(&vec![1.0; 128]), 1.0);
        assert_eq!(compute_volume(&[]), 0.0);
    }
}
