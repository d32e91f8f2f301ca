//! Takeout Downloader - sequential export archive retrieval.
//!
//! This library automates downloading a numbered sequence of export archive
//! files from a service that requires an authenticated browser session.
//!
//! # Features
//!
//! - Strictly sequential, paced downloads (the service rate-limits)
//! - Resume from the last completed index
//! - Bounded retry with exponential backoff for transient failures
//! - Session-expiry detection with a single credential refresh-and-retry
//! - Atomic archive and progress-record writes (no partial artifacts)
//!
//! # Example
//!
//! ```no_run
//! use takeout_downloader::auth::CurlFileProvider;
//! use takeout_downloader::config::Config;
//! use takeout_downloader::download::{HttpFetcher, RunPlan, Sequencer};
//! use takeout_downloader::progress::ProgressStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(std::path::Path::new("config.toml"))?;
//!     let fetcher = HttpFetcher::new(&config)?;
//!     let provider = CurlFileProvider::new(config.auth.curl_file.clone(), None);
//!     let store = ProgressStore::in_directory(&config.output_directory());
//!
//!     let sequencer = Sequencer::new(config, fetcher, Box::new(provider), store);
//!     let summary = sequencer
//!         .run(RunPlan { start: 1, end: 10, resume: true })
//!         .await?;
//!     println!("{} archives downloaded", summary.succeeded);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod fs;
pub mod output;
pub mod progress;

// Re-exports for convenience
pub use auth::{CredentialProvider, CurlFileProvider, SessionCredentials};
pub use config::Config;
pub use download::{
    DownloadOutcome, DownloadTask, HaltReason, HttpFetcher, RunPlan, RunSummary, Sequencer,
};
pub use error::{Error, Result};
pub use progress::{ProgressRecord, ProgressStore};
