//! Uploaded product images.
//!
//! Uploads are stored flat in the uploads directory under a random name and
//! referenced as `/api/files/<name>`.

use std::path::{Path, PathBuf};

use tokio::fs;
use url::Url;
use uuid::Uuid;
use vhook_models::SourceImage;

use crate::error::{WorkerError, WorkerResult};

/// URL prefix uploaded images are served under.
pub const FILES_ROUTE: &str = "/api/files/";

/// URL prefix final videos are served under.
pub const VIDEOS_ROUTE: &str = "/api/videos/";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Reference stored on a generation for an uploaded file name.
pub fn upload_reference(file_name: &str) -> String {
    format!("{FILES_ROUTE}{file_name}")
}

/// A plain file name with no path components.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.starts_with('.')
}

/// Resolve an image reference (`/api/files/x.jpg`, a full URL to it, or a
/// bare file name) to a path inside `uploads_dir`.
pub fn resolve_upload_path(uploads_dir: &Path, reference: &str) -> WorkerResult<PathBuf> {
    let path = match Url::parse(reference) {
        Ok(url) => url.path().to_string(),
        Err(_) => reference.to_string(),
    };
    let name = path
        .strip_prefix(FILES_ROUTE)
        .unwrap_or(&path)
        .rsplit('/')
        .next()
        .unwrap_or_default();

    if !is_safe_file_name(name) {
        return Err(WorkerError::invalid_image(format!(
            "unsupported image reference: {}",
            reference
        )));
    }
    Ok(uploads_dir.join(name))
}

/// Load the product image a generation refers to.
pub async fn load_source_image(uploads_dir: &Path, reference: &str) -> WorkerResult<SourceImage> {
    let path = resolve_upload_path(uploads_dir, reference)?;
    let bytes = fs::read(&path).await.map_err(|e| {
        WorkerError::invalid_image(format!("cannot read {}: {}", path.display(), e))
    })?;
    if bytes.is_empty() {
        return Err(WorkerError::invalid_image(format!("{} is empty", path.display())));
    }
    Ok(SourceImage::from_named_bytes(bytes, &path))
}

/// Store an uploaded image under a fresh random name and return that name.
pub async fn store_upload(uploads_dir: &Path, original_name: &str, bytes: &[u8]) -> WorkerResult<String> {
    if bytes.is_empty() {
        return Err(WorkerError::invalid_image("uploaded image is empty"));
    }

    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or_else(|| "jpg".to_string());

    let file_name = format!("{}.{}", Uuid::new_v4(), ext);
    fs::create_dir_all(uploads_dir).await?;
    fs::write(uploads_dir.join(&file_name), bytes).await?;
    Ok(file_name)
}
