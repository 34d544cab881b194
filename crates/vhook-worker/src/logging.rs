//! Structured generation logging.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vhook_models::GenerationId;

/// Install the global subscriber: JSON lines when `LOG_FORMAT=json`,
/// colored text otherwise. `RUST_LOG` adds to the `vhook=info` default.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["vhook=info", "sqlx=warn"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Logger for one operation on one generation.
///
/// Every line carries the generation ID and operation name so a
/// generation can be followed through the logs.
#[derive(Debug, Clone)]
pub struct JobLogger {
    generation_id: String,
    operation: String,
}

impl JobLogger {
    pub fn new(generation_id: &GenerationId, operation: &str) -> Self {
        Self {
            generation_id: generation_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            generation_id = %self.generation_id,
            operation = %self.operation,
            "Started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            generation_id = %self.generation_id,
            operation = %self.operation,
            "Progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            generation_id = %self.generation_id,
            operation = %self.operation,
            "Warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            generation_id = %self.generation_id,
            operation = %self.operation,
            "Error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            generation_id = %self.generation_id,
            operation = %self.operation,
            "Completed: {}", message
        );
    }

    pub fn generation_id(&self) -> &str {
        &self.generation_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span to instrument the futures of this operation with.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "generation",
            generation_id = %self.generation_id,
            operation = %self.operation
        )
    }
}
