//! Spectral-shape viseme classifier.
//!
//! This is a coarse band-energy heuristic, not a phoneme recogniser: it looks
//! at where the energy sits in the spectrum (low / mid / high) and at the
//! overall volume, and picks the most plausible mouth shape. The thresholds
//! below are tuning constants; the decision *order* is the contract, the
//! exact numbers are not.

use super::VisemeCategory;

/// Volume below this is silence regardless of spectral content
const SILENCE_THRESHOLD: f32 = 0.02;

/// Band boundaries as proportions of the bin count
const LOW_BAND_END: f32 = 0.1;
const MID_BAND_END: f32 = 0.4;
const HIGH_BAND_END: f32 = 0.8;

/// Band-dominance thresholds on normalized ratios
const LOW_DOMINANT: f32 = 0.5;
const MID_DOMINANT: f32 = 0.4;
const HIGH_DOMINANT: f32 = 0.4;

/// Volume tiers used to pick within a dominant band and in the mixed fallback
const VOLUME_HIGH: f32 = 0.3;
const VOLUME_MID: f32 = 0.25;
const VOLUME_LOW: f32 = 0.2;
const VOLUME_FLOOR: f32 = 0.1;

/// Mean magnitudes of the three bands, normalized so the ratios sum to 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandRatios {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

/// Split the spectrum into low/mid/high bands by bin proportion and return
/// normalized band ratios. Returns `None` when there is no energy at all.
pub fn band_ratios(spectrum: &[f32]) -> Option<BandRatios> {
    if spectrum.is_empty() {
        return None;
    }

    let len = spectrum.len() as f32;
    let low_end = ((len * LOW_BAND_END) as usize).max(1);
    let mid_end = ((len * MID_BAND_END) as usize).max(low_end + 1).min(spectrum.len());
    let high_end = ((len * HIGH_BAND_END) as usize).max(mid_end + 1).min(spectrum.len());

    let mean = |slice: &[f32]| -> f32 {
        if slice.is_empty() {
            0.0
        } else {
            slice.iter().sum::<f32>() / slice.len() as f32
        }
    };

    let low = mean(&spectrum[..low_end]);
    let mid = mean(&spectrum[low_end..mid_end]);
    let high = mean(&spectrum[mid_end..high_end]);

    let total = low + mid + high;
    if total <= 0.0 {
        return None;
    }

    Some(BandRatios {
        low: low / total,
        mid: mid / total,
        high: high / total,
    })
}

/// Classify a frequency snapshot + volume into a viseme category.
///
/// Pure and deterministic: identical inputs always yield the same category.
/// Decision order:
/// 1. below the silence threshold, or zero energy → neutral
/// 2. low band dominant → open vowels (aa / oh by volume)
/// 3. mid band dominant → mid vowels (eh / ih by volume)
/// 4. high band dominant → fricatives (ss / ff by volume)
/// 5. mixed spectrum → volume tier alone (aa / eh / uu / neutral)
pub fn classify(spectrum: &[f32], volume: f32) -> VisemeCategory {
    if volume < SILENCE_THRESHOLD {
        return VisemeCategory::Neutral;
    }

    let Some(ratios) = band_ratios(spectrum) else {
        return VisemeCategory::Neutral;
    };

    if ratios.low > LOW_DOMINANT {
        if volume > VOLUME_HIGH {
            VisemeCategory::Aa
        } else {
            VisemeCategory::Oh
        }
    } else if ratios.mid > MID_DOMINANT {
        if volume > VOLUME_MID {
            VisemeCategory::Eh
        } else {
            VisemeCategory::Ih
        }
    } else if ratios.high > HIGH_DOMINANT {
        if volume > VOLUME_LOW {
            VisemeCategory::Ss
        } else {
            VisemeCategory::Ff
        }
    } else if volume > VOLUME_HIGH {
        VisemeCategory::Aa
    } else if volume > VOLUME_LOW {
        VisemeCategory::Eh
    } else if volume > VOLUME_FLOOR {
        VisemeCategory::Uu
    } else {
        VisemeCategory::Neutral
    }
}
