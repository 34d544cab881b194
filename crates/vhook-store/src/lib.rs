//! SQLite job store.
//!
//! Generation and clip records live in two tables. Every write is a single
//! statement, so each row transition is atomic on its own; the only
//! multi-row write is the batch insert of a generation's clips.

pub mod clips;
pub mod db;
pub mod error;
pub mod generations;

pub use clips::ClipRepository;
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use generations::GenerationRepository;
