//! The media tool seam used by the clip workers and the assembler.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::{
    placeholder_label_filter, placeholder_source, FILTER_COLOR_GRADE, FILTER_LOUDNORM,
};

/// Operations the pipeline needs from an external media tool.
///
/// Any tool offering equivalent filters can stand in for FFmpeg.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Render a solid-color stand-in clip labelled with `label`.
    async fn render_placeholder(&self, output: &Path, label: &str, duration_secs: f64) -> MediaResult<()>;

    /// Concatenate the clips listed in a concat list file, in order.
    async fn concat(&self, list_file: &Path, output: &Path) -> MediaResult<()>;

    /// Normalize loudness of the whole track.
    async fn normalize_loudness(&self, input: &Path, output: &Path) -> MediaResult<()>;

    /// Apply the fixed color grade.
    async fn color_grade(&self, input: &Path, output: &Path) -> MediaResult<()>;
}

/// [`MediaTool`] backed by the `ffmpeg` binary.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTool {
    runner: FfmpegRunner,
}

impl FfmpegTool {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }

    /// Tool whose individual commands are killed after `secs`.
    pub fn with_timeout(secs: u64) -> Self {
        Self::new(FfmpegRunner::new().with_timeout(secs))
    }
}

/// Placeholder clip command.
pub fn placeholder_command(output: &Path, label: &str, duration_secs: f64) -> FfmpegCommand {
    FfmpegCommand::lavfi(placeholder_source(duration_secs), output)
        .video_filter(placeholder_label_filter(label))
        .video_codec("libx264")
        .preset("fast")
        .crf(23)
        .pixel_format("yuv420p")
}

/// Re-encoding concat command; clips from different sources may not share codec parameters.
pub fn concat_command(list_file: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::concat_list(list_file, output)
        .video_codec("libx264")
        .audio_codec("aac")
        .preset("medium")
        .crf(18)
        .pixel_format("yuv420p")
}

/// Loudness normalization command; video is stream-copied.
pub fn loudnorm_command(input: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .audio_filter(FILTER_LOUDNORM)
        .video_codec("copy")
}

/// Color grade command; audio is stream-copied.
pub fn color_grade_command(input: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .video_filter(FILTER_COLOR_GRADE)
        .audio_codec("copy")
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn render_placeholder(&self, output: &Path, label: &str, duration_secs: f64) -> MediaResult<()> {
        debug!(output = %output.display(), "Rendering placeholder clip");
        self.runner
            .run(&placeholder_command(output, label, duration_secs))
            .await
    }

    async fn concat(&self, list_file: &Path, output: &Path) -> MediaResult<()> {
        self.runner.run(&concat_command(list_file, output)).await
    }

    async fn normalize_loudness(&self, input: &Path, output: &Path) -> MediaResult<()> {
        self.runner.run(&loudnorm_command(input, output)).await
    }

    async fn color_grade(&self, input: &Path, output: &Path) -> MediaResult<()> {
        self.runner.run(&color_grade_command(input, output)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_reencodes() {
        let args = concat_command(Path::new("list.txt"), Path::new("out.mp4")).build_args();
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
        assert!(args.windows(2).any(|w| w == ["-pix_fmt", "yuv420p"]));
    }

    #[test]
    fn test_normalization_passes_copy_the_other_stream() {
        let loud = loudnorm_command(Path::new("in.mp4"), Path::new("out.mp4")).build_args();
        assert!(loud.windows(2).any(|w| w == ["-filter:a", FILTER_LOUDNORM]));
        assert!(loud.windows(2).any(|w| w == ["-c:v", "copy"]));

        let grade = color_grade_command(Path::new("in.mp4"), Path::new("out.mp4")).build_args();
        assert!(grade.windows(2).any(|w| w == ["-vf", FILTER_COLOR_GRADE]));
        assert!(grade.windows(2).any(|w| w == ["-c:a", "copy"]));
    }

    #[test]
    fn test_placeholder_command() {
        let args = placeholder_command(Path::new("clip.mp4"), "Clip 1234abcd", 5.0).build_args();
        assert!(args.windows(2).any(|w| w == ["-i", "color=c=black:s=405x720:d=5"]));
        assert!(args.iter().any(|a| a.starts_with("drawtext=")));
    }
}
