//! Morph target binding and application.
//!
//! Mesh formats disagree on blend shape naming (ARKit-style `jawOpen`,
//! capitalised `JawOpen`, legacy `mouthOpen`), so each weight channel carries
//! an alias list. Names are resolved to indices once per mesh and cached in a
//! [`MeshBinding`]; the hot path only touches indices.

use crate::viseme::{VisemeWeights, WeightChannel};

/// Abstraction over a renderable mesh with named morph targets.
///
/// Implemented by the embedding renderer; the engine never sees geometry,
/// only the name -> index dictionary and the per-index weight slots.
pub trait MorphMesh {
    /// Look up a morph target index by exact name
    fn morph_index(&self, name: &str) -> Option<usize>;
    fn morph_weight(&self, index: usize) -> f32;
    fn set_morph_weight(&mut self, index: usize, weight: f32);
}

/// Breathing moves the jaw by at most this fraction of full open
const BREATHING_JAW_DEPTH: f32 = 0.05;

/// Accepted morph target names per weight channel, most specific first
fn channel_aliases(channel: WeightChannel) -> &'static [&'static str] {
    match channel {
        WeightChannel::JawOpen => &["jawOpen", "mouthOpen", "JawOpen"],
        WeightChannel::MouthPucker => &["mouthPucker", "mouthFunnel", "MouthFunnel"],
        WeightChannel::MouthStretch => &["mouthStretch", "mouthSmileLeft", "MouthStretchLeft"],
        WeightChannel::MouthSmile => &["mouthSmile", "MouthSmile"],
        WeightChannel::MouthFrown => &["mouthFrown", "MouthFrown"],
        WeightChannel::LipUpperUp => &["lipUpperUp", "UpperLipUp"],
        WeightChannel::LipLowerDown => &["lipLowerDown", "LowerLipDown"],
        WeightChannel::TongueOut => &["tongueOut", "TongueOut"],
    }
}

/// Eyelid morphs; blink drives every one that exists, both sides
const BLINK_ALIASES: &[&str] = &["eyeBlinkLeft", "eyeBlinkRight", "EyeBlinkLeft", "EyeBlinkRight"];

/// Resolved morph target indices for one mesh.
///
/// Resolution happens once; a mesh with none of the expected names yields an
/// empty binding and application becomes a no-op.
#[derive(Debug, Clone, Default)]
pub struct MeshBinding {
    /// First matching alias per channel
    channel_slots: [Option<usize>; WeightChannel::ALL.len()],
    /// Every matching eyelid slot
    blink_slots: Vec<usize>,
    /// Every matching jaw slot, for breathing
    jaw_slots: Vec<usize>,
}

impl MeshBinding {
    pub fn resolve<M: MorphMesh>(mesh: &M) -> Self {
        let mut channel_slots = [None; WeightChannel::ALL.len()];
        for (i, &channel) in WeightChannel::ALL.iter().enumerate() {
            channel_slots[i] = channel_aliases(channel)
                .iter()
                .find_map(|name| mesh.morph_index(name));
        }

        let blink_slots = BLINK_ALIASES
            .iter()
            .filter_map(|name| mesh.morph_index(name))
            .collect();

        let jaw_slots = channel_aliases(WeightChannel::JawOpen)
            .iter()
            .filter_map(|name| mesh.morph_index(name))
            .collect();

        Self {
            channel_slots,
            blink_slots,
            jaw_slots,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channel_slots.iter().all(Option::is_none)
            && self.blink_slots.is_empty()
            && self.jaw_slots.is_empty()
    }

    /// Write one frame of state into the mesh.
    ///
    /// `speaking` gates breathing: the breathing jaw only raises the jaw
    /// weight (never lowers it) and only while the mouth is otherwise idle.
    pub fn apply<M: MorphMesh>(
        &self,
        mesh: &mut M,
        weights: &VisemeWeights,
        blink: f32,
        breathing: f32,
        micro_scale: f32,
        speaking: bool,
    ) {
        for (i, &channel) in WeightChannel::ALL.iter().enumerate() {
            if let Some(slot) = self.channel_slots[i] {
                mesh.set_morph_weight(slot, weights.channel(channel));
            }
        }

        for &slot in &self.blink_slots {
            mesh.set_morph_weight(slot, blink);
        }

        if !speaking && breathing > 0.0 {
            let amount = breathing * BREATHING_JAW_DEPTH * micro_scale;
            for &slot in &self.jaw_slots {
                let current = mesh.morph_weight(slot);
                mesh.set_morph_weight(slot, current.max(amount));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viseme::VisemeCategory;
    use std::collections::HashMap;

    struct FakeMesh {
        dict: HashMap<String, usize>,
        weights: Vec<f32>,
    }

    impl FakeMesh {
        fn new(names: &[&str]) -> Self {
            let dict: HashMap<String, usize> = names
                .iter()
                .enumerate()
                .map(|(i, n)| (n.to_string(), i))
                .collect();
            let weights = vec![0.0; names.len()];
            Self { dict, weights }
        }

        fn weight_of(&self, name: &str) -> f32 {
            self.weights[self.dict[name]]
        }
    }

    impl MorphMesh for FakeMesh {
        fn morph_index(&self, name: &str) -> Option<usize> {
            self.dict.get(name).copied()
        }
        fn morph_weight(&self, index: usize) -> f32 {
            self.weights[index]
        }
        fn set_morph_weight(&mut self, index: usize, weight: f32) {
            self.weights[index] = weight;
        }
    }

    const ARKIT_NAMES: &[&str] = &[
        "jawOpen",
        "mouthPucker",
        "mouthStretch",
        "mouthSmile",
        "mouthFrown",
        "lipUpperUp",
        "lipLowerDown",
        "tongueOut",
        "eyeBlinkLeft",
        "eyeBlinkRight",
    ];

    #[test]
    fn test_resolve_arkit_names() {
        let mesh = FakeMesh::new(ARKIT_NAMES);
        let binding = MeshBinding::resolve(&mesh);
        assert!(!binding.is_empty());
        assert_eq!(binding.blink_slots.len(), 2);
        assert!(binding.channel_slots.iter().all(Option::is_some));
    }

    #[test]
    fn test_resolve_alias_fallback() {
        // Legacy naming: jaw via "mouthOpen", capitalised blink
        let mesh = FakeMesh::new(&["mouthOpen", "EyeBlinkLeft", "EyeBlinkRight"]);
        let binding = MeshBinding::resolve(&mesh);
        assert!(binding.channel_slots[0].is_some());
        assert_eq!(binding.blink_slots.len(), 2);
    }

    #[test]
    fn test_unknown_mesh_is_noop() {
        let mut mesh = FakeMesh::new(&["browInnerUp", "cheekPuff"]);
        let binding = MeshBinding::resolve(&mesh);
        assert!(binding.is_empty());

        binding.apply(
            &mut mesh,
            &VisemeCategory::Aa.template(),
            1.0,
            1.0,
            0.3,
            false,
        );
        assert!(mesh.weights.iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_apply_writes_weights_and_blink() {
        let mut mesh = FakeMesh::new(ARKIT_NAMES);
        let binding = MeshBinding::resolve(&mesh);
        let weights = VisemeCategory::Aa.template();

        binding.apply(&mut mesh, &weights, 0.7, 0.0, 0.3, true);

        assert_eq!(mesh.weight_of("jawOpen"), weights.jaw_open);
        assert_eq!(mesh.weight_of("mouthStretch"), weights.mouth_stretch);
        assert_eq!(mesh.weight_of("eyeBlinkLeft"), 0.7);
        assert_eq!(mesh.weight_of("eyeBlinkRight"), 0.7);
    }

    #[test]
    fn test_breathing_only_raises_idle_jaw() {
        let mut mesh = FakeMesh::new(ARKIT_NAMES);
        let binding = MeshBinding::resolve(&mesh);

        // Idle: breathing nudges the jaw
        binding.apply(&mut mesh, &VisemeWeights::NEUTRAL, 0.0, 1.0, 0.3, false);
        let idle_jaw = mesh.weight_of("jawOpen");
        assert!((idle_jaw - 0.05 * 0.3).abs() < 1e-6);

        // Speaking: viseme jaw wins, breathing ignored
        let aa = VisemeCategory::Aa.template();
        binding.apply(&mut mesh, &aa, 0.0, 1.0, 0.3, true);
        assert_eq!(mesh.weight_of("jawOpen"), aa.jaw_open);
    }

    #[test]
    fn test_breathing_never_lowers_jaw() {
        let mut mesh = FakeMesh::new(ARKIT_NAMES);
        let binding = MeshBinding::resolve(&mesh);

        // Jaw already part-open (mid-smoothing toward closed); tiny breathing
        // must not pull it down
        let mut weights = VisemeWeights::NEUTRAL;
        weights.jaw_open = 0.4;
        binding.apply(&mut mesh, &weights, 0.0, 0.2, 0.3, false);
        assert_eq!(mesh.weight_of("jawOpen"), 0.4);
    }
}
