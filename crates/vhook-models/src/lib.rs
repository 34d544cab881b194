//! Shared data models for the ViralHook backend.
//!
//! This crate provides Serde-serializable types for:
//! - Generation records and their lifecycle status
//! - Per-scene clip records
//! - Shot scripts produced by the vision director
//! - Source images passed to the generation adapters

pub mod clip;
pub mod generation;
pub mod image;
pub mod script;

// Re-export common types
pub use clip::{Clip, ClipId, ClipStatus, CLIP_DURATION_SECS};
pub use generation::{Generation, GenerationId, GenerationStatus};
pub use image::SourceImage;
pub use script::{build_clip_prompt, Scene, ScriptError, ShotScript, Tone, SCENES_PER_SCRIPT};

/// Error returned when a stored status string is not recognised.
#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind} status: {value}")]
pub struct StatusParseError {
    pub kind: &'static str,
    pub value: String,
}
