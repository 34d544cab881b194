//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use vhook_models::CLIP_DURATION_SECS;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum video generation jobs in flight across one generation
    pub max_inflight_clips: usize,
    /// Maximum generations running at once in this process
    pub max_concurrent_generations: usize,
    /// Delay between status checks of a remote job
    pub poll_interval: Duration,
    /// Status checks before a remote job is considered timed out
    pub max_poll_attempts: u32,
    /// Length of every clip, including placeholders
    pub clip_duration_secs: f64,
    /// Where downloaded clips and assembly intermediates live
    pub clips_dir: PathBuf,
    /// Where uploaded product images live
    pub uploads_dir: PathBuf,
    /// Where final videos are published
    pub output_dir: PathBuf,
    /// Kill any single FFmpeg run after this many seconds
    pub ffmpeg_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_inflight_clips: 3,
            max_concurrent_generations: 2,
            poll_interval: Duration::from_secs(5),
            max_poll_attempts: 120, // 10 minutes at the default interval
            clip_duration_secs: CLIP_DURATION_SECS,
            clips_dir: PathBuf::from("clips"),
            uploads_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("output"),
            ffmpeg_timeout_secs: 600,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_inflight_clips: std::env::var("WORKER_MAX_INFLIGHT_CLIPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_inflight_clips),
            max_concurrent_generations: std::env::var("WORKER_MAX_GENERATIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_generations),
            poll_interval: std::env::var("WORKER_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            max_poll_attempts: std::env::var("WORKER_MAX_POLL_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_poll_attempts),
            clips_dir: std::env::var("CLIPS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.clips_dir),
            uploads_dir: std::env::var("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.uploads_dir),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            ffmpeg_timeout_secs: std::env::var("FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.ffmpeg_timeout_secs),
            ..defaults
        }
    }

    /// Upper bound on how long one remote job may be polled.
    pub fn poll_budget(&self) -> Duration {
        self.poll_interval * self.max_poll_attempts
    }
}
