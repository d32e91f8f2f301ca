//! Durable run progress.
//!
//! Provides the persisted record of the highest completed index and any
//! permanently failed indices, which is the sole source of truth for
//! `--continue`.

pub mod store;

pub use store::{ProgressRecord, ProgressStore, PROGRESS_FILE_NAME};
