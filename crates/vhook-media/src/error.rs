//! Media errors.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg is not installed or not on PATH")]
    FfmpegNotFound,

    /// FFmpeg ran and exited non-zero. `stderr` holds the tail of its output.
    #[error("{message}{}", stderr_suffix(.stderr))]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("ffmpeg killed after {0}s")]
    Timeout(u64),

    #[error("missing media file {0}")]
    FileNotFound(PathBuf),

    #[error("nothing to concatenate")]
    EmptyConcatList,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }
}

fn stderr_suffix(stderr: &Option<String>) -> String {
    match stderr {
        Some(tail) => format!(": {}", tail),
        None => String::new(),
    }
}
