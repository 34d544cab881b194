//! Gemini vision director.
//!
//! Sends the product image to Gemini together with the director brief and
//! parses the returned 12-scene shot script.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vhook_models::{ShotScript, SourceImage, SCENES_PER_SCRIPT};

use crate::director::{parse_script, ScriptProducer};
use crate::error::{WorkerError, WorkerResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.5-pro"];

/// Configuration for the Gemini director.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Models tried in order until one returns a usable script
    pub models: Vec<String>,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl GeminiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            models: std::env::var("GEMINI_MODELS")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|m| m.trim().to_string())
                        .filter(|m| !m.is_empty())
                        .collect::<Vec<_>>()
                })
                .filter(|models| !models.is_empty())
                .unwrap_or(defaults.models),
            timeout: defaults.timeout,
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// [`ScriptProducer`] backed by the Gemini `generateContent` API.
pub struct GeminiDirector {
    api_key: String,
    config: GeminiConfig,
    client: Client,
}

impl GeminiDirector {
    /// Create a new director. Fails when no API key is configured.
    pub fn new(config: GeminiConfig) -> WorkerResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| WorkerError::config_error("GEMINI_API_KEY not set"))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WorkerError::config_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            config,
            client,
        })
    }

    async fn call_gemini_api(&self, model: &str, image: &SourceImage) -> WorkerResult<ShotScript> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            model,
            self.api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        text: Some(director_prompt()),
                        inline_data: None,
                    },
                    Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: image.mime_type.clone(),
                            data: image.base64(),
                        }),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkerError::ai_failed(format!("Gemini API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::ai_failed(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            WorkerError::ai_failed(format!("Failed to parse Gemini response: {}", e))
        })?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.iter().find_map(|p| p.text.as_deref()))
            .ok_or_else(|| WorkerError::ai_failed("No content in Gemini response"))?;

        parse_script(text)
    }
}

#[async_trait]
impl ScriptProducer for GeminiDirector {
    async fn produce_script(&self, image: &SourceImage) -> WorkerResult<ShotScript> {
        let mut last_error = None;

        for model in &self.config.models {
            info!("Attempting Gemini API with model: {}", model);
            match self.call_gemini_api(model, image).await {
                Ok(script) => {
                    info!(
                        scenes = script.scenes.len(),
                        "Got shot script for '{}' from {}", script.product_name, model
                    );
                    return Ok(script);
                }
                Err(e) => {
                    warn!("Failed with model {}: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| WorkerError::ai_failed("No Gemini models configured")))
    }
}

/// Director brief sent with the product image.
fn director_prompt() -> String {
    format!(
        r#"You are a short-form video ad director. Study the product in the image and write a
shot script for a 60-second vertical (9:16) user-generated-content style ad.

The ad is exactly {SCENES_PER_SCRIPT} scenes of 5 seconds each:
- scenes 1-3: hook
- scenes 4-6: problem
- scenes 7-9: solution
- scenes 10-12: cta

Every scene prompt must describe one continuous handheld shot with the same person,
setting and lighting, with the product clearly visible.

Return ONLY a JSON object with this schema:
{{
  "product_name": "string",
  "master_description": "detailed description of the product, actor and setting shared by every shot",
  "tone": "UGC",
  "scenes": [
    {{
      "id": 1,
      "role": "hook",
      "prompt": "what happens in this 5-second shot",
      "shot_type": "medium close-up",
      "continuity_constraints": "same actor, same setting"
    }}
  ]
}}"#
    )
}
