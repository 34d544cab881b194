//! Client for the image-to-video generation API.
//!
//! The pipeline talks to video generation through the [`VideoGenerator`]
//! trait: submit a prompt and image, poll the remote task, download the
//! result. [`WanClient`] implements it against the DashScope async task API.

pub mod client;
pub mod error;
pub mod generator;
pub mod types;

pub use client::{VideoClientConfig, WanClient};
pub use error::{VideoError, VideoResult};
pub use generator::{JobPoll, SubmitOutcome, VideoGenerator};
