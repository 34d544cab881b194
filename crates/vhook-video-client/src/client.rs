//! DashScope Wan image-to-video client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, info};
use vhook_models::SourceImage;

use crate::error::{VideoError, VideoResult};
use crate::generator::{JobPoll, SubmitOutcome, VideoGenerator};
use crate::types::{
    GenerationParameters, QueryRequest, SubmitInput, SubmitRequest, TaskResponse, TaskState,
};

const DEFAULT_API_URL: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/video-generation/generation";
const DEFAULT_MODEL: &str = "wan2.6-i2v";

/// Configuration for the video generation client.
#[derive(Debug, Clone)]
pub struct VideoClientConfig {
    /// API key; when absent the pipeline renders placeholder clips instead
    pub api_key: Option<String>,
    /// Task submission endpoint
    pub api_url: String,
    /// Model name
    pub model: String,
    /// Per-request timeout
    pub timeout: Duration,
    pub aspect_ratio: String,
    pub resolution: String,
    /// Requested clip length in seconds
    pub duration_secs: u32,
}

impl Default for VideoClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(300),
            aspect_ratio: "9:16".to_string(),
            resolution: "720P".to_string(),
            duration_secs: 5,
        }
    }
}

impl VideoClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("WAN_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            api_url: std::env::var("WAN_API_URL").unwrap_or(defaults.api_url),
            model: std::env::var("WAN_MODEL_NAME").unwrap_or(defaults.model),
            timeout: std::env::var("WAN_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            ..defaults
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Task query endpoint: the submission URL with its last segment replaced by `query`.
    pub fn query_url(&self) -> String {
        let base = self.api_url.trim_end_matches('/');
        match base.rsplit_once('/') {
            Some((prefix, _)) => format!("{}/query", prefix),
            None => format!("{}/query", base),
        }
    }
}

/// Client for the DashScope asynchronous video generation API.
pub struct WanClient {
    http: Client,
    config: VideoClientConfig,
    api_key: String,
}

impl WanClient {
    /// Create a new client. Fails when no API key is configured.
    pub fn new(config: VideoClientConfig) -> VideoResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| VideoError::NotConfigured("WAN_API_KEY is not set".to_string()))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(VideoError::Network)?;

        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    /// Read a JSON task envelope, rejecting HTTP and provider-level errors.
    async fn read_task_response(response: Response, context: &str) -> VideoResult<TaskResponse> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VideoError::RequestFailed(format!(
                "{} returned {}: {}",
                context, status, body
            )));
        }

        let task: TaskResponse = response.json().await?;
        if let Some(code) = task.error_code() {
            return Err(VideoError::Api {
                code: code.to_string(),
                message: task.message.clone().unwrap_or_else(|| code.to_string()),
            });
        }
        Ok(task)
    }
}

#[async_trait]
impl VideoGenerator for WanClient {
    async fn submit(&self, prompt: &str, image: &SourceImage) -> VideoResult<SubmitOutcome> {
        let body = SubmitRequest {
            model: &self.config.model,
            input: SubmitInput {
                img_url: image.data_url(),
                prompt,
            },
            parameters: GenerationParameters {
                aspect_ratio: &self.config.aspect_ratio,
                duration: self.config.duration_secs,
                resolution: &self.config.resolution,
            },
        };

        debug!(model = %self.config.model, "Submitting video task to {}", self.config.api_url);

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.api_key)
            .header("X-DashScope-Async", "enable")
            .json(&body)
            .send()
            .await?;

        let task = Self::read_task_response(response, "Video task submission").await?;

        if let Some(job_id) = task.task_id() {
            info!(job_id = %job_id, "Video task queued");
            return Ok(SubmitOutcome::Queued {
                job_id: job_id.to_string(),
            });
        }
        if let Some(url) = task.result_url() {
            info!("Video returned synchronously");
            return Ok(SubmitOutcome::Ready {
                result_url: url.to_string(),
            });
        }
        if let Some(request_id) = task.request_id.as_deref() {
            return Ok(SubmitOutcome::Queued {
                job_id: request_id.to_string(),
            });
        }

        Err(VideoError::invalid_response(
            "response carried neither a task id nor a video URL",
        ))
    }

    async fn poll(&self, job_id: &str) -> VideoResult<JobPoll> {
        let body = QueryRequest {
            model: &self.config.model,
            task_id: job_id,
        };

        let response = self
            .http
            .post(self.config.query_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let task = Self::read_task_response(response, "Video task query").await?;
        let status = task.task_status().unwrap_or("UNKNOWN");
        debug!(job_id = %job_id, status = %status, "Polled video task");

        match TaskState::parse(status) {
            TaskState::Succeeded => match task.result_url() {
                Some(url) => Ok(JobPoll::Succeeded {
                    result_url: url.to_string(),
                }),
                None => Err(VideoError::invalid_response(format!(
                    "task {} succeeded without a video URL",
                    job_id
                ))),
            },
            TaskState::Failed => Ok(JobPoll::Failed {
                reason: task.failure_reason(),
            }),
            TaskState::Running => Ok(JobPoll::Pending),
        }
    }

    async fn download(&self, result_url: &str) -> VideoResult<Vec<u8>> {
        let response = self.http.get(result_url).send().await?;
        if !response.status().is_success() {
            return Err(VideoError::DownloadFailed(format!(
                "{} returned {}",
                result_url,
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
