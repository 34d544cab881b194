//! Wire types for the DashScope video generation API.

use serde::{Deserialize, Serialize};

/// Task submission body.
#[derive(Debug, Serialize)]
pub struct SubmitRequest<'a> {
    pub model: &'a str,
    pub input: SubmitInput<'a>,
    pub parameters: GenerationParameters<'a>,
}

#[derive(Debug, Serialize)]
pub struct SubmitInput<'a> {
    /// `data:` URL of the source image
    pub img_url: String,
    pub prompt: &'a str,
}

#[derive(Debug, Serialize)]
pub struct GenerationParameters<'a> {
    pub aspect_ratio: &'a str,
    pub duration: u32,
    pub resolution: &'a str,
}

/// Task status query body.
#[derive(Debug, Serialize)]
pub struct QueryRequest<'a> {
    pub model: &'a str,
    pub task_id: &'a str,
}

/// Envelope shared by submission and query responses.
#[derive(Debug, Default, Deserialize)]
pub struct TaskResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub output: TaskOutput,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskOutput {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub task_status: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TaskResponse {
    /// Error code, if the provider reported one other than `Success`.
    pub fn error_code(&self) -> Option<&str> {
        self.code
            .as_deref()
            .filter(|code| !code.is_empty() && *code != "Success")
    }

    /// Explicit task id; `request_id` is only a fallback and is handled by the caller.
    pub fn task_id(&self) -> Option<&str> {
        self.output.task_id.as_deref().or(self.task_id.as_deref())
    }

    pub fn task_status(&self) -> Option<&str> {
        self.output
            .task_status
            .as_deref()
            .or(self.output.status.as_deref())
            .or(self.status.as_deref())
    }

    pub fn result_url(&self) -> Option<&str> {
        self.output
            .video_url
            .as_deref()
            .or(self.output.video.as_deref())
            .or(self.output.url.as_deref())
            .or(self.video_url.as_deref())
    }

    pub fn failure_reason(&self) -> String {
        self.output
            .message
            .clone()
            .or_else(|| self.output.error.clone())
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

/// Normalized provider task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Succeeded,
    Failed,
    Running,
}

impl TaskState {
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "SUCCEEDED" | "SUCCESS" | "COMPLETED" => TaskState::Succeeded,
            "FAILED" | "ERROR" => TaskState::Failed,
            _ => TaskState::Running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_parsing() {
        assert_eq!(TaskState::parse("SUCCEEDED"), TaskState::Succeeded);
        assert_eq!(TaskState::parse("completed"), TaskState::Succeeded);
        assert_eq!(TaskState::parse("Error"), TaskState::Failed);
        assert_eq!(TaskState::parse("RUNNING"), TaskState::Running);
        assert_eq!(TaskState::parse("PENDING"), TaskState::Running);
    }

    #[test]
    fn test_task_id_prefers_output() {
        let resp: TaskResponse = serde_json::from_str(
            r#"{"request_id":"req-1","output":{"task_id":"task-1","task_status":"PENDING"}}"#,
        )
        .unwrap();
        assert_eq!(resp.task_id(), Some("task-1"));
        assert!(resp.error_code().is_none());

        let resp: TaskResponse = serde_json::from_str(r#"{"request_id":"req-1"}"#).unwrap();
        assert_eq!(resp.task_id(), None);
    }

    #[test]
    fn test_error_code() {
        let resp: TaskResponse =
            serde_json::from_str(r#"{"code":"InvalidParameter","message":"Model not exist"}"#).unwrap();
        assert_eq!(resp.error_code(), Some("InvalidParameter"));

        let ok: TaskResponse = serde_json::from_str(r#"{"code":"Success"}"#).unwrap();
        assert!(ok.error_code().is_none());
    }
}
