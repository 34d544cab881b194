//! The video generation seam.

use async_trait::async_trait;
use vhook_models::SourceImage;

use crate::error::VideoResult;

/// Result of submitting a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The provider queued a task that must be polled
    Queued { job_id: String },
    /// The provider answered synchronously with the finished clip
    Ready { result_url: String },
}

/// Result of one status check on a remote task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPoll {
    Pending,
    Succeeded { result_url: String },
    Failed { reason: String },
}

/// An image-to-video provider with asynchronous task semantics.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    /// Submit one clip for generation.
    async fn submit(&self, prompt: &str, image: &SourceImage) -> VideoResult<SubmitOutcome>;

    /// Check the status of a queued task.
    async fn poll(&self, job_id: &str) -> VideoResult<JobPoll>;

    /// Fetch the rendered clip.
    async fn download(&self, result_url: &str) -> VideoResult<Vec<u8>>;
}
