//! Clip records: the rendered video for one scene of a generation.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{GenerationId, Scene, StatusParseError};

/// Every clip is rendered at a fixed length.
pub const CLIP_DURATION_SECS: f64 = 5.0;

/// Unique identifier for a clip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ClipId(pub String);

impl ClipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short label used on placeholder clips and in file names.
    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(8).map(|(i, _)| i).unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Clip status.
///
/// `pending -> generating -> completed | failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    #[default]
    Pending,
    Generating,
    Completed,
    Failed,
}

impl ClipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipStatus::Pending => "pending",
            ClipStatus::Generating => "generating",
            ClipStatus::Completed => "completed",
            ClipStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ClipStatus::Completed | ClipStatus::Failed)
    }
}

impl fmt::Display for ClipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClipStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ClipStatus::Pending),
            "generating" => Ok(ClipStatus::Generating),
            "completed" => Ok(ClipStatus::Completed),
            "failed" => Ok(ClipStatus::Failed),
            _ => Err(StatusParseError {
                kind: "clip",
                value: s.to_string(),
            }),
        }
    }
}

/// A clip record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Clip {
    pub id: ClipId,

    /// Owning generation
    pub generation_id: GenerationId,

    /// 1-based position in the final video
    pub sequence_index: u32,

    /// Narrative role (hook, problem, solution, cta)
    pub role: String,

    /// Final prompt sent to the video generator
    pub prompt: String,

    /// Remote task identifier, when the generator queued a job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_job_id: Option<String>,

    /// URL the rendered clip was downloaded from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    /// Local file holding the rendered clip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,

    pub duration_secs: f64,

    pub status: ClipStatus,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Clip {
    /// Create a pending clip for a scene.
    pub fn for_scene(generation_id: &GenerationId, scene: &Scene, prompt: impl Into<String>) -> Self {
        Self {
            id: ClipId::new(),
            generation_id: generation_id.clone(),
            sequence_index: scene.id,
            role: scene.role.clone(),
            prompt: prompt.into(),
            remote_job_id: None,
            remote_url: None,
            local_path: None,
            duration_secs: CLIP_DURATION_SECS,
            status: ClipStatus::Pending,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        let id = ClipId::from_string("0123456789abcdef");
        assert_eq!(id.short(), "01234567");
        assert_eq!(ClipId::from_string("abc").short(), "abc");
    }

    #[test]
    fn test_for_scene_starts_pending() {
        let scene = Scene::new(4, "problem", "A cluttered desk");
        let clip = Clip::for_scene(&GenerationId::new(), &scene, "full prompt");
        assert_eq!(clip.sequence_index, 4);
        assert_eq!(clip.role, "problem");
        assert_eq!(clip.status, ClipStatus::Pending);
        assert_eq!(clip.duration_secs, CLIP_DURATION_SECS);
        assert!(clip.local_path.is_none());
    }
}
