//! Download engine.
//!
//! This module provides:
//! - Per-index download tasks and their terminal outcomes
//! - The authenticated file fetcher
//! - The sequencing state machine with resume, retry, and pacing

pub mod fetcher;
pub mod outcome;
pub mod sequencer;
pub mod task;

pub use fetcher::{Fetch, HttpFetcher};
pub use outcome::DownloadOutcome;
pub use sequencer::{HaltReason, RunPlan, RunSummary, Sequencer};
pub use task::DownloadTask;
