//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Maximum number of stderr bytes kept on a failed run.
const STDERR_TAIL_BYTES: usize = 2048;

/// One FFmpeg invocation: a single input and a single output file.
///
/// Runs are always `-y -v error`; overwriting is expected because every
/// stage writes a fresh intermediate.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// File path, or a source expression for lavfi inputs
    input: PathBuf,
    output: PathBuf,
    before_input: Vec<String>,
    after_input: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            before_input: Vec::new(),
            after_input: Vec::new(),
        }
    }

    /// Read from a lavfi source such as `color=c=black:s=405x720:d=5`.
    pub fn lavfi(source: impl Into<String>, output: impl AsRef<Path>) -> Self {
        Self::new(source.into(), output).input_options(["-f", "lavfi"])
    }

    /// Read a concat demuxer list. Lists hold absolute paths, hence `-safe 0`.
    pub fn concat_list(list_file: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self::new(list_file, output).input_options(["-f", "concat", "-safe", "0"])
    }

    /// Options placed before `-i`.
    pub fn input_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.before_input.extend(options.into_iter().map(Into::into));
        self
    }

    /// Option placed after the input, before the output path.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.after_input.push(arg.into());
        self
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn audio_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter:a").output_arg(filter)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// x264 constant rate factor.
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    pub fn pixel_format(self, format: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(format)
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Full argument list, without the `ffmpeg` program name.
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-v", "error"].iter().map(|s| s.to_string()).collect();
        args.extend(self.before_input.iter().cloned());
        args.extend(["-i".to_string(), self.input.display().to_string()]);
        args.extend(self.after_input.iter().cloned());
        args.push(self.output.display().to_string());
        args
    }
}

/// Spawns `ffmpeg` for a command, optionally killing it after a deadline.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    deadline: Option<Duration>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.deadline = Some(Duration::from_secs(secs));
        self
    }

    /// Run to completion. A non-zero exit carries the stderr tail.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!(args = %args.join(" "), "ffmpeg");

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, child).await {
                Ok(result) => result?,
                Err(_) => {
                    // kill_on_drop reaps the child
                    warn!(output = %cmd.output().display(), "ffmpeg exceeded {:?}", deadline);
                    return Err(MediaError::Timeout(deadline.as_secs()));
                }
            },
            None => child.await?,
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = stderr_tail(&output.stderr);
        Err(MediaError::ffmpeg_failed(
            format!("ffmpeg {} exited with {}", cmd.output().display(), output.status),
            (!stderr.is_empty()).then_some(stderr),
            output.status.code(),
        ))
    }
}

/// Last few lines of stderr, trimmed to a bounded size.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

/// Path of the `ffmpeg` binary, if installed.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}
