//! HTTP handlers.

pub mod files;
pub mod generations;
pub mod health;
pub mod uploads;

pub use health::health;
