//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("AI analysis failed: {0}")]
    AiFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid script: {0}")]
    InvalidScript(#[from] vhook_models::ScriptError),

    #[error("Invalid source image: {0}")]
    InvalidImage(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Remote job {job_id} still pending after {attempts} polls")]
    PollTimedOut { job_id: String, attempts: u32 },

    #[error("Remote job failed: {0}")]
    RemoteJobFailed(String),

    #[error("Assembly failed: {0}")]
    AssemblyFailed(String),

    #[error("Store error: {0}")]
    Store(#[from] vhook_store::StoreError),

    #[error("Media error: {0}")]
    Media(#[from] vhook_media::MediaError),

    #[error("Video generation error: {0}")]
    Video(#[from] vhook_video_client::VideoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn ai_failed(msg: impl Into<String>) -> Self {
        Self::AiFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn assembly_failed(msg: impl Into<String>) -> Self {
        Self::AssemblyFailed(msg.into())
    }
}
