//! Shot scripts produced by the vision director.
//!
//! A script is validated once, where it enters the system (the script
//! producer or the generate endpoint). Everything downstream works on the
//! typed [`Scene`] values and does not re-check them.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Number of scenes a director script is expected to contain.
pub const SCENES_PER_SCRIPT: usize = 12;

/// Validation failures for a shot script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("script has no scenes")]
    NoScenes,

    #[error("product name is empty")]
    MissingProductName,

    #[error("scene {0} has an empty prompt")]
    EmptyPrompt(u32),

    #[error("scene ids start at 1, got {0}")]
    InvalidSceneId(u32),

    #[error("scene id {0} appears more than once")]
    DuplicateSceneId(u32),
}

/// Visual tone of the ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema, Default)]
pub enum Tone {
    #[default]
    #[serde(rename = "UGC")]
    Ugc,
    #[serde(rename = "premium")]
    Premium,
    #[serde(rename = "playful")]
    Playful,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Ugc => "UGC",
            Tone::Premium => "premium",
            Tone::Playful => "playful",
        }
    }

    /// Style sentence injected into every clip prompt.
    pub fn style_description(&self) -> &'static str {
        match self {
            Tone::Ugc => "authentic user-generated content, casual and relatable",
            Tone::Premium => "luxury commercial look, sophisticated and elegant",
            Tone::Playful => "fun and energetic, vibrant and engaging",
        }
    }

    /// Lenient parse; unknown values fall back to UGC.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "premium" => Tone::Premium,
            "playful" => Tone::Playful,
            _ => Tone::Ugc,
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Model output is free text, so never reject a script over its tone.
impl<'de> Deserialize<'de> for Tone {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| Tone::parse_lenient(&s)).unwrap_or_default())
    }
}

/// One 5-second shot of the ad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// 1-based sequence id; defines playback order
    pub id: u32,

    /// Narrative role (hook, problem, solution, cta)
    #[serde(default)]
    pub role: String,

    /// Scene-specific prompt
    pub prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shot_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuity_constraints: Option<String>,
}

impl Scene {
    pub fn new(id: u32, role: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id,
            role: role.into(),
            prompt: prompt.into(),
            shot_type: None,
            continuity_constraints: None,
        }
    }
}

/// Structured shot list for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ShotScript {
    pub product_name: String,

    /// Visual description of the product shared by every shot
    #[serde(default)]
    pub master_description: String,

    pub scenes: Vec<Scene>,

    #[serde(default)]
    pub tone: Tone,
}

impl ShotScript {
    /// Validate the script.
    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.product_name.trim().is_empty() {
            return Err(ScriptError::MissingProductName);
        }
        if self.scenes.is_empty() {
            return Err(ScriptError::NoScenes);
        }

        let mut seen = HashSet::with_capacity(self.scenes.len());
        for scene in &self.scenes {
            if scene.id == 0 {
                return Err(ScriptError::InvalidSceneId(scene.id));
            }
            if !seen.insert(scene.id) {
                return Err(ScriptError::DuplicateSceneId(scene.id));
            }
            if scene.prompt.trim().is_empty() {
                return Err(ScriptError::EmptyPrompt(scene.id));
            }
        }
        Ok(())
    }

    /// Scenes sorted by sequence id.
    pub fn ordered_scenes(&self) -> Vec<Scene> {
        let mut scenes = self.scenes.clone();
        scenes.sort_by_key(|s| s.id);
        scenes
    }

    /// Context paragraph prepended to every clip prompt so all shots stay
    /// visually consistent.
    pub fn shared_context(&self) -> String {
        let shots = self.scenes.len();
        format!(
            "You are generating shot footage for a {shots}-shot vertical video ad for {}.\n\
             Master visual description: {}\n\
             Style: {}\n\
             Keep the product, lighting and color grade identical in all {shots} shots, \
             and preserve the same setting and characters across the sequence.",
            self.product_name.trim(),
            self.master_description.trim(),
            self.tone.style_description(),
        )
    }
}

/// Build the final prompt for one clip.
pub fn build_clip_prompt(shared_context: &str, index: u32, total: usize, scene_prompt: &str) -> String {
    format!("{shared_context}\n\nShot {index} of {total}: {}", scene_prompt.trim())
}
