//! Viseme categories and their canonical blend shape weight templates.
//!
//! A viseme is the visual mouth shape for a group of speech sounds. The
//! classifier picks a category from spectral shape; the template table turns
//! the category into an 8-channel weight vector for the mesh.

pub mod classifier;

use serde::{Deserialize, Serialize};

pub use classifier::classify;

/// The 8 animation channels driven by lip sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightChannel {
    JawOpen,
    MouthPucker,
    MouthStretch,
    MouthSmile,
    MouthFrown,
    LipUpperUp,
    LipLowerDown,
    TongueOut,
}

impl WeightChannel {
    pub const ALL: [WeightChannel; 8] = [
        WeightChannel::JawOpen,
        WeightChannel::MouthPucker,
        WeightChannel::MouthStretch,
        WeightChannel::MouthSmile,
        WeightChannel::MouthFrown,
        WeightChannel::LipUpperUp,
        WeightChannel::LipLowerDown,
        WeightChannel::TongueOut,
    ];
}

/// Fixed 8-channel blend shape weight vector, each channel in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VisemeWeights {
    pub jaw_open: f32,
    pub mouth_pucker: f32,
    pub mouth_stretch: f32,
    pub mouth_smile: f32,
    pub mouth_frown: f32,
    pub lip_upper_up: f32,
    pub lip_lower_down: f32,
    pub tongue_out: f32,
}

impl VisemeWeights {
    pub const NEUTRAL: VisemeWeights = VisemeWeights {
        jaw_open: 0.0,
        mouth_pucker: 0.0,
        mouth_stretch: 0.0,
        mouth_smile: 0.0,
        mouth_frown: 0.0,
        lip_upper_up: 0.0,
        lip_lower_down: 0.0,
        tongue_out: 0.0,
    };

    /// Read a single channel
    pub fn channel(&self, channel: WeightChannel) -> f32 {
        match channel {
            WeightChannel::JawOpen => self.jaw_open,
            WeightChannel::MouthPucker => self.mouth_pucker,
            WeightChannel::MouthStretch => self.mouth_stretch,
            WeightChannel::MouthSmile => self.mouth_smile,
            WeightChannel::MouthFrown => self.mouth_frown,
            WeightChannel::LipUpperUp => self.lip_upper_up,
            WeightChannel::LipLowerDown => self.lip_lower_down,
            WeightChannel::TongueOut => self.tongue_out,
        }
    }

    /// Write a single channel (clamped to [0, 1])
    pub fn set_channel(&mut self, channel: WeightChannel, value: f32) {
        let value = value.clamp(0.0, 1.0);
        match channel {
            WeightChannel::JawOpen => self.jaw_open = value,
            WeightChannel::MouthPucker => self.mouth_pucker = value,
            WeightChannel::MouthStretch => self.mouth_stretch = value,
            WeightChannel::MouthSmile => self.mouth_smile = value,
            WeightChannel::MouthFrown => self.mouth_frown = value,
            WeightChannel::LipUpperUp => self.lip_upper_up = value,
            WeightChannel::LipLowerDown => self.lip_lower_down = value,
            WeightChannel::TongueOut => self.tongue_out = value,
        }
    }

    /// Channel values in [`WeightChannel::ALL`] order
    pub fn to_array(&self) -> [f32; 8] {
        [
            self.jaw_open,
            self.mouth_pucker,
            self.mouth_stretch,
            self.mouth_smile,
            self.mouth_frown,
            self.lip_upper_up,
            self.lip_lower_down,
            self.tongue_out,
        ]
    }
}

/// The 14 viseme categories recognised by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisemeCategory {
    /// Mouth at rest / silence
    Neutral,
    /// 'a' in "father"
    Aa,
    /// 'e' in "bed"
    Eh,
    /// 'i' in "bit"
    Ih,
    /// 'o' in "boat"
    Oh,
    /// 'u' in "boot"
    Uu,
    /// Bilabials: p, b, m
    Pp,
    /// Labiodentals: f, v
    Ff,
    /// Alveolar plosives: t, d
    Th,
    /// Sibilants: s, z
    Ss,
    /// n, l
    Nn,
    /// Velars: k, g
    Kk,
    /// r
    Rr,
    /// w
    Ww,
}

impl Default for VisemeCategory {
    fn default() -> Self {
        Self::Neutral
    }
}

impl std::fmt::Display for VisemeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VisemeCategory {
    pub const ALL: [VisemeCategory; 14] = [
        VisemeCategory::Neutral,
        VisemeCategory::Aa,
        VisemeCategory::Eh,
        VisemeCategory::Ih,
        VisemeCategory::Oh,
        VisemeCategory::Uu,
        VisemeCategory::Pp,
        VisemeCategory::Ff,
        VisemeCategory::Th,
        VisemeCategory::Ss,
        VisemeCategory::Nn,
        VisemeCategory::Kk,
        VisemeCategory::Rr,
        VisemeCategory::Ww,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VisemeCategory::Neutral => "neutral",
            VisemeCategory::Aa => "aa",
            VisemeCategory::Eh => "eh",
            VisemeCategory::Ih => "ih",
            VisemeCategory::Oh => "oh",
            VisemeCategory::Uu => "uu",
            VisemeCategory::Pp => "pp",
            VisemeCategory::Ff => "ff",
            VisemeCategory::Th => "th",
            VisemeCategory::Ss => "ss",
            VisemeCategory::Nn => "nn",
            VisemeCategory::Kk => "kk",
            VisemeCategory::Rr => "rr",
            VisemeCategory::Ww => "ww",
        }
    }

    /// Map a phoneme symbol to its viseme category.
    ///
    /// Covers the coarse phoneme groups that share a mouth shape; unknown
    /// symbols map to `Neutral`.
    pub fn from_phoneme(phoneme: &str) -> Self {
        match phoneme {
            "sil" => VisemeCategory::Neutral,
            "a" => VisemeCategory::Aa,
            "e" => VisemeCategory::Eh,
            "i" => VisemeCategory::Ih,
            "o" => VisemeCategory::Oh,
            "u" => VisemeCategory::Uu,
            "p" | "b" | "m" => VisemeCategory::Pp,
            "f" | "v" => VisemeCategory::Ff,
            "t" | "d" => VisemeCategory::Th,
            "s" | "z" => VisemeCategory::Ss,
            "n" | "l" => VisemeCategory::Nn,
            "k" | "g" => VisemeCategory::Kk,
            "r" => VisemeCategory::Rr,
            "w" => VisemeCategory::Ww,
            _ => VisemeCategory::Neutral,
        }
    }

    /// Canonical weight template for this category.
    ///
    /// The table is total (the match is exhaustive) and immutable; templates
    /// are hand-tuned constants, not derived data.
    pub fn template(&self) -> VisemeWeights {
        match self {
            VisemeCategory::Neutral => VisemeWeights::NEUTRAL,
            VisemeCategory::Aa => VisemeWeights {
                jaw_open: 0.8,
                mouth_stretch: 0.3,
                lip_upper_up: 0.2,
                lip_lower_down: 0.5,
                ..VisemeWeights::NEUTRAL
            },
            VisemeCategory::Eh => VisemeWeights {
                jaw_open: 0.4,
                mouth_stretch: 0.6,
                mouth_smile: 0.3,
                lip_upper_up: 0.1,
                lip_lower_down: 0.2,
                ..VisemeWeights::NEUTRAL
            },
            VisemeCategory::Ih => VisemeWeights {
                jaw_open: 0.3,
                mouth_stretch: 0.4,
                mouth_smile: 0.5,
                lip_lower_down: 0.1,
                ..VisemeWeights::NEUTRAL
            },
            VisemeCategory::Oh => VisemeWeights {
                jaw_open: 0.5,
                mouth_pucker: 0.7,
                lip_upper_up: 0.1,
                lip_lower_down: 0.3,
                ..VisemeWeights::NEUTRAL
            },
            VisemeCategory::Uu => VisemeWeights {
                jaw_open: 0.3,
                mouth_pucker: 0.9,
                lip_lower_down: 0.2,
                ..VisemeWeights::NEUTRAL
            },
            VisemeCategory::Pp => VisemeWeights {
                mouth_pucker: 0.8,
                ..VisemeWeights::NEUTRAL
            },
            VisemeCategory::Ff => VisemeWeights {
                jaw_open: 0.1,
                mouth_stretch: 0.3,
                lip_lower_down: 0.4,
                ..VisemeWeights::NEUTRAL
            },
            VisemeCategory::Th => VisemeWeights {
                jaw_open: 0.2,
                mouth_stretch: 0.2,
                lip_upper_up: 0.3,
                lip_lower_down: 0.3,
                tongue_out: 0.2,
                ..VisemeWeights::NEUTRAL
            },
            VisemeCategory::Ss => VisemeWeights {
                jaw_open: 0.1,
                mouth_stretch: 0.4,
                mouth_smile: 0.6,
                tongue_out: 0.1,
                ..VisemeWeights::NEUTRAL
            },
            VisemeCategory::Nn => VisemeWeights {
                jaw_open: 0.3,
                mouth_stretch: 0.3,
                mouth_smile: 0.2,
                lip_upper_up: 0.2,
                lip_lower_down: 0.2,
                tongue_out: 0.3,
                ..VisemeWeights::NEUTRAL
            },
            VisemeCategory::Kk => VisemeWeights {
                jaw_open: 0.4,
                mouth_stretch: 0.2,
                lip_lower_down: 0.2,
                ..VisemeWeights::NEUTRAL
            },
            VisemeCategory::Rr => VisemeWeights {
                jaw_open: 0.3,
                mouth_pucker: 0.3,
                lip_upper_up: 0.1,
                lip_lower_down: 0.1,
                tongue_out: 0.4,
                ..VisemeWeights::NEUTRAL
            },
            VisemeCategory::Ww => VisemeWeights {
                jaw_open: 0.2,
                mouth_pucker: 0.9,
                ..VisemeWeights::NEUTRAL
            },
        }
    }
}
