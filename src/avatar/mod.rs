//! Avatar-facing state: smoothing, idle animation, and mesh application.

pub mod idle;
pub mod mesh;
pub mod smoothing;

pub use idle::{BlinkPhase, IdleAnimationController};
pub use mesh::{MeshBinding, MorphMesh};
pub use smoothing::SmoothingEngine;
