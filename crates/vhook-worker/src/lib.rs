//! Clip generation pipeline.
//!
//! This crate provides:
//! - The [`ScriptProducer`] seam and its Gemini implementation
//! - The bounded clip worker pool and the batch completion gate
//! - The assembler that turns completed clips into the final ad
//! - A background executor that runs generations off the request path

pub mod assembler;
pub mod config;
pub mod director;
pub mod error;
pub mod executor;
pub mod gemini;
pub mod images;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod poller;

pub use assembler::{Assembler, AssemblyOutcome};
pub use config::WorkerConfig;
pub use director::ScriptProducer;
pub use error::{WorkerError, WorkerResult};
pub use executor::GenerationExecutor;
pub use gemini::{GeminiConfig, GeminiDirector};
pub use logging::{init_tracing, JobLogger};
pub use pipeline::{video_generator, ClipOutcome, GenerationPipeline, PipelineContext};
pub use poller::{JobPoller, PollState};
