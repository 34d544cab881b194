//! Script producer seam and model-output parsing.

use async_trait::async_trait;
use tracing::warn;
use vhook_models::{ShotScript, SourceImage, SCENES_PER_SCRIPT};

use crate::error::{WorkerError, WorkerResult};

/// Turns a product image into a validated shot script.
#[async_trait]
pub trait ScriptProducer: Send + Sync {
    async fn produce_script(&self, image: &SourceImage) -> WorkerResult<ShotScript>;
}

/// Parse model output into a validated script.
///
/// Accepts bare JSON, JSON wrapped in markdown fences, or JSON surrounded by
/// prose (the outermost `{...}` is used).
pub fn parse_script(text: &str) -> WorkerResult<ShotScript> {
    let cleaned = strip_code_fences(text);

    let script: ShotScript = match serde_json::from_str(cleaned) {
        Ok(script) => script,
        Err(first_err) => {
            let object = extract_object(cleaned).ok_or_else(|| {
                WorkerError::ai_failed(format!("Script is not valid JSON: {}", first_err))
            })?;
            serde_json::from_str(object).map_err(|e| {
                WorkerError::ai_failed(format!("Script is not valid JSON: {}", e))
            })?
        }
    };

    script.validate()?;
    if script.scenes.len() != SCENES_PER_SCRIPT {
        warn!(
            scenes = script.scenes.len(),
            "Director returned {} scenes, expected {}",
            script.scenes.len(),
            SCENES_PER_SCRIPT
        );
    }
    Ok(script)
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
