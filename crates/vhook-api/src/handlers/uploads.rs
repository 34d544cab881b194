//! Image upload and product analysis handlers.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::info;
use vhook_models::{ShotScript, SourceImage};
use vhook_worker::images::{store_upload, upload_reference};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    pub script: ShotScript,
}

/// The `image` part of a multipart upload.
struct ImageField {
    file_name: String,
    bytes: Vec<u8>,
}

async fn read_image_field(mut multipart: Multipart) -> ApiResult<ImageField> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("image") {
            continue;
        }

        if let Some(content_type) = field.content_type() {
            if !content_type.starts_with("image/") {
                return Err(ApiError::bad_request(format!(
                    "Expected an image upload, got {}",
                    content_type
                )));
            }
        }
        let file_name = field.file_name().unwrap_or("upload.jpg").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
        if bytes.is_empty() {
            return Err(ApiError::bad_request("Uploaded image is empty"));
        }

        return Ok(ImageField {
            file_name,
            bytes: bytes.to_vec(),
        });
    }

    Err(ApiError::bad_request("Missing 'image' field"))
}

/// Store a product image.
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let image = read_image_field(multipart).await?;
    let stored = store_upload(&state.config.uploads_dir, &image.file_name, &image.bytes).await?;
    metrics::record_upload(image.bytes.len());

    info!(file = %stored, bytes = image.bytes.len(), "Stored upload");
    Ok(Json(UploadResponse {
        image_url: upload_reference(&stored),
    }))
}

/// Store a product image and have the director write a shot script for it.
pub async fn analyze_product(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<AnalyzeResponse>> {
    let director = state
        .director
        .clone()
        .ok_or_else(|| ApiError::internal("Vision director not configured: set GEMINI_API_KEY"))?;

    let image = read_image_field(multipart).await?;
    let stored = store_upload(&state.config.uploads_dir, &image.file_name, &image.bytes).await?;
    metrics::record_upload(image.bytes.len());

    let source = SourceImage::from_named_bytes(image.bytes, &stored);
    let script = director
        .produce_script(&source)
        .await
        .map_err(|e| ApiError::internal(format!("Error analyzing product: {}", e)))?;

    info!(
        file = %stored,
        scenes = script.scenes.len(),
        "Analyzed product '{}'", script.product_name
    );
    Ok(Json(AnalyzeResponse {
        image_url: upload_reference(&stored),
        script,
    }))
}
