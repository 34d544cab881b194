//! Filesystem helpers for clip downloads and assembly outputs.

use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Tries a rename first; on EXDEV it copies to a temporary file next to
/// `dst`, renames that into place and removes the source.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    ensure_parent(dst).await?;

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            debug!(
                "Cross-device rename, copying instead: {} -> {}",
                src.display(),
                dst.display()
            );
            let tmp_dst = dst.with_extension("tmp");
            fs::copy(src, &tmp_dst).await?;
            if let Err(e) = fs::rename(&tmp_dst, dst).await {
                let _ = fs::remove_file(&tmp_dst).await;
                return Err(MediaError::from(e));
            }
            if let Err(e) = fs::remove_file(src).await {
                warn!("Failed to remove {} after copy: {}", src.display(), e);
            }
            Ok(())
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Write `bytes` to `dst` through a `.part` file so readers never observe a
/// half-written clip.
pub async fn write_file_atomic(dst: impl AsRef<Path>, bytes: &[u8]) -> MediaResult<()> {
    let dst = dst.as_ref();
    ensure_parent(dst).await?;

    let part = dst.with_extension("part");
    fs::write(&part, bytes).await?;
    if let Err(e) = fs::rename(&part, dst).await {
        let _ = fs::remove_file(&part).await;
        return Err(MediaError::from(e));
    }
    Ok(())
}

/// Copy `src` to `dst`, creating the destination directory if needed.
pub async fn copy_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    if !fs::try_exists(src).await? {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }
    ensure_parent(dst.as_ref()).await?;
    fs::copy(src, dst).await?;
    Ok(())
}

/// Delete files, logging and skipping failures. Returns how many were removed.
pub async fn remove_files<P: AsRef<Path>>(paths: &[P]) -> usize {
    let mut removed = 0;
    for path in paths {
        let path = path.as_ref();
        match fs::remove_file(path).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
    removed
}

async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !fs::try_exists(parent).await? {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_to_subdirectory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("final.mp4");
        let dst = dir.path().join("output").join("final.mp4");

        fs::write(&src, b"video").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_write_file_atomic_leaves_no_part_file() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("clips").join("abc.mp4");

        write_file_atomic(&dst, b"clip bytes").await.unwrap();

        assert_eq!(fs::read(&dst).await.unwrap(), b"clip bytes");
        assert!(!dst.with_extension("part").exists());
    }

    #[tokio::test]
    async fn test_copy_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = copy_file(dir.path().join("nope.mp4"), dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_files_skips_missing() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("a.mp4");
        fs::write(&present, b"x").await.unwrap();

        let removed = remove_files(&[present.clone(), dir.path().join("b.mp4")]).await;
        assert_eq!(removed, 1);
        assert!(!present.exists());
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }
}
