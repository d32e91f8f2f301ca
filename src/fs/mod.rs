//! Filesystem module.
//!
//! Provides:
//! - Archive filename generation and parsing
//! - Existing-file detection for idempotent re-runs

pub mod naming;

pub use naming::{archive_filename, existing_archive, index_from_filename, temp_filename};
