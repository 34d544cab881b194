//! Health check handler.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use vhook_media::check_ffmpeg;

use crate::state::AppState;

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub vision_configured: bool,
    pub video_configured: bool,
    pub ffmpeg_available: bool,
    pub database: String,
}

/// Liveness plus which adapters are configured.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.db.ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        vision_configured: state.vision_configured(),
        video_configured: state.video_configured(),
        ffmpeg_available: check_ffmpeg().is_ok(),
        database,
    })
}
