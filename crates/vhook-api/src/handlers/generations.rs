//! Generation handlers.

use std::borrow::Cow;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::{Validate, ValidationError};
use vhook_models::{Clip, Generation, GenerationId, GenerationStatus, ShotScript};
use vhook_worker::images::resolve_upload_path;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateVideoRequest {
    #[validate(custom(function = "validate_script"))]
    pub script: ShotScript,

    #[serde(rename = "imageUrl", alias = "image_url")]
    #[validate(length(min = 1, max = 2048))]
    pub image_url: String,
}

fn validate_script(script: &ShotScript) -> Result<(), ValidationError> {
    script.validate().map_err(|e| {
        let mut err = ValidationError::new("invalid_script");
        err.message = Some(Cow::Owned(e.to_string()));
        err
    })
}

#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub id: String,
    pub status: GenerationStatus,
    pub clips: Vec<Clip>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,
}

/// Create a generation and start it in the background.
pub async fn generate_video(
    State(state): State<AppState>,
    payload: Result<Json<GenerateVideoRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<GenerationResponse>)> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request.validate()?;

    let path = resolve_upload_path(&state.config.uploads_dir, &request.image_url)?;
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(ApiError::bad_request(format!(
            "Image not found: {}",
            request.image_url
        )));
    }

    let generation = Generation::new(request.image_url, request.script);
    state.generations.create(&generation).await?;
    state.executor.submit(generation.id.clone());
    metrics::record_generation_started();

    info!(
        generation_id = %generation.id,
        scenes = generation.script.scenes.len(),
        "Started generation"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(GenerationResponse {
            id: generation.id.to_string(),
            status: generation.status,
            clips: Vec::new(),
            final_video_url: None,
        }),
    ))
}

/// Status of a generation and its clips in sequence order.
pub async fn generation_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<GenerationResponse>> {
    let id = GenerationId::from_string(id);
    let generation = state
        .generations
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Generation not found"))?;
    let clips = state.clips.list_for_generation(&id).await?;

    Ok(Json(GenerationResponse {
        id: generation.id.to_string(),
        status: generation.status,
        clips,
        final_video_url: generation.final_video,
    }))
}
