//! Concat demuxer list files.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Render concat demuxer lines for the given clips, in order.
pub fn concat_list_contents<P: AsRef<Path>>(clips: &[P]) -> String {
    let mut contents = String::new();
    for clip in clips {
        let path = clip.as_ref().to_string_lossy().replace('\'', "'\\''");
        contents.push_str(&format!("file '{}'\n", path));
    }
    contents
}

/// Write a concat list referencing `clips` by absolute path.
///
/// Every clip must exist; the order of `clips` is the playback order.
pub async fn write_concat_list<P: AsRef<Path>>(clips: &[P], list_file: impl AsRef<Path>) -> MediaResult<()> {
    if clips.is_empty() {
        return Err(MediaError::EmptyConcatList);
    }

    let mut absolute = Vec::with_capacity(clips.len());
    for clip in clips {
        let clip = clip.as_ref();
        if !fs::try_exists(clip).await? {
            return Err(MediaError::FileNotFound(clip.to_path_buf()));
        }
        absolute.push(fs::canonicalize(clip).await?);
    }

    fs::write(list_file, concat_list_contents(&absolute)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_quotes_are_escaped() {
        let contents = concat_list_contents(&["/tmp/a.mp4", "/tmp/it's.mp4"]);
        assert_eq!(contents, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }

    #[tokio::test]
    async fn test_write_concat_list_keeps_order() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("b.mp4");
        let second = dir.path().join("a.mp4");
        fs::write(&first, b"1").await.unwrap();
        fs::write(&second, b"2").await.unwrap();

        let list = dir.path().join("list.txt");
        write_concat_list(&[&first, &second], &list).await.unwrap();

        let contents = fs::read_to_string(&list).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("b.mp4'"));
        assert!(lines[1].ends_with("a.mp4'"));
    }

    #[tokio::test]
    async fn test_missing_clip_is_rejected() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.mp4");
        let err = write_concat_list(&[&missing], dir.path().join("list.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
