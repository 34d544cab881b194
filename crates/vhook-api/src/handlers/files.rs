//! Stored upload and video delivery.

use std::path::Path as FsPath;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use vhook_models::image::mime_for_path;
use vhook_worker::images::is_safe_file_name;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn serve_upload(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Response> {
    serve_file(&state.config.uploads_dir, &name, "File").await
}

pub async fn serve_video(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Response> {
    serve_file(&state.config.output_dir, &name, "Video").await
}

async fn serve_file(dir: &FsPath, name: &str, kind: &str) -> ApiResult<Response> {
    if !is_safe_file_name(name) {
        return Err(ApiError::bad_request("Invalid file name"));
    }

    let path = dir.join(name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found(format!("{} not found", kind)));
        }
        Err(e) => return Err(ApiError::internal(format!("Failed to read {}: {}", name, e))),
    };

    Ok(([(header::CONTENT_TYPE, content_type(&path))], bytes).into_response())
}

fn content_type(path: &FsPath) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("mp4") => "video/mp4",
        _ => mime_for_path(path),
    }
}
