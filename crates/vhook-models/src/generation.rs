//! Generation records: one end-to-end request from product image to final video.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{ShotScript, StatusParseError};

/// Unique identifier for a generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct GenerationId(pub String);

impl GenerationId {
    /// Generate a new random generation ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for GenerationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Overall generation status.
///
/// `pending -> generating -> assembling -> completed | failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Record created, pipeline not started yet
    #[default]
    Pending,
    /// Clips are being generated
    Generating,
    /// Every clip completed, final video is being assembled
    Assembling,
    /// Final video is available
    Completed,
    /// At least one clip or the assembly failed
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Generating => "generating",
            GenerationStatus::Assembling => "assembling",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(GenerationStatus::Pending),
            "generating" => Ok(GenerationStatus::Generating),
            "assembling" => Ok(GenerationStatus::Assembling),
            "completed" => Ok(GenerationStatus::Completed),
            "failed" => Ok(GenerationStatus::Failed),
            _ => Err(StatusParseError {
                kind: "generation",
                value: s.to_string(),
            }),
        }
    }
}

/// A generation record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Generation {
    /// Unique generation ID
    pub id: GenerationId,

    /// Reference to the uploaded product image (e.g. `/api/files/<name>`)
    pub source_image: String,

    /// Shot script the clips are generated from
    pub script: ShotScript,

    /// Overall status
    pub status: GenerationStatus,

    /// Reference to the assembled video, set together with `completed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video: Option<String>,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Generation {
    /// Create a new pending generation.
    pub fn new(source_image: impl Into<String>, script: ShotScript) -> Self {
        Self {
            id: GenerationId::new(),
            source_image: source_image.into(),
            script,
            status: GenerationStatus::Pending,
            final_video: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}
