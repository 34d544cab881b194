//! Axum HTTP API server.
//!
//! This crate provides:
//! - Product image upload and analysis into a shot script
//! - Generation start and status endpoints
//! - Delivery of stored uploads and final videos
//! - Rate limiting, security headers and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
