//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.

use metrics::{counter, histogram};
use vhook_models::{ClipStatus, GenerationStatus};

/// Metric names as constants for consistency.
pub mod names {
    pub const GENERATIONS_TOTAL: &str = "vhook_generations_total";
    pub const CLIPS_TOTAL: &str = "vhook_clips_total";
    pub const CLIP_DURATION_SECONDS: &str = "vhook_clip_duration_seconds";
    pub const ASSEMBLY_DURATION_SECONDS: &str = "vhook_assembly_duration_seconds";
    pub const ASSEMBLY_FALLBACKS_TOTAL: &str = "vhook_assembly_fallbacks_total";
}

/// Record a generation reaching a terminal status.
pub fn record_generation(status: GenerationStatus) {
    counter!(names::GENERATIONS_TOTAL, "status" => status.as_str()).increment(1);
}

/// Record a clip reaching a terminal status.
pub fn record_clip(status: ClipStatus, duration_secs: f64, placeholder: bool) {
    let source = if placeholder { "placeholder" } else { "remote" };
    counter!(names::CLIPS_TOTAL, "status" => status.as_str(), "source" => source).increment(1);
    histogram!(names::CLIP_DURATION_SECONDS, "source" => source).record(duration_secs);
}

pub fn record_assembly(duration_secs: f64) {
    histogram!(names::ASSEMBLY_DURATION_SECONDS).record(duration_secs);
}

/// Record a finishing stage that fell back to a straight copy.
pub fn record_assembly_fallback(stage: &'static str) {
    counter!(names::ASSEMBLY_FALLBACKS_TOTAL, "stage" => stage).increment(1);
}
