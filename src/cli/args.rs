//! Command-line argument definitions using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// Takeout export archive downloader CLI.
#[derive(Parser, Debug)]
#[command(
    name = "takeout-dl",
    version,
    about = "Download export archives in sequence",
    long_about = "Download a numbered sequence of Takeout export archives through an \
                  authenticated browser session capture.\n\n\
                  Supports resuming from the last completed index, bounded retries, \
                  and credential refresh on session expiry."
)]
pub struct Args {
    /// Starting index for the download sequence (1-based).
    #[arg(short, long)]
    pub start: Option<u64>,

    /// Ending index for the download sequence (inclusive).
    #[arg(short, long)]
    pub end: Option<u64>,

    /// Output directory for downloaded archives.
    #[arg(short = 'd', long = "directory")]
    pub directory: Option<PathBuf>,

    /// Delay in seconds between downloads.
    #[arg(long)]
    pub delay: Option<u64>,

    /// Continue from the last completed index in the progress record.
    #[arg(long = "continue", short = 'c')]
    pub continue_run: bool,

    /// Export job ID.
    #[arg(long = "job-id", env = "TAKEOUT_JOB_ID")]
    pub job_id: Option<String>,

    /// Path to the saved cURL capture of a download request.
    #[arg(long = "curl-file")]
    pub curl_file: Option<PathBuf>,

    /// Path to configuration file.
    #[arg(long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(&self, config: &mut Config) {
        if let Some(job_id) = &self.job_id {
            config.export.job_id = job_id.clone();
        }

        if let Some(directory) = &self.directory {
            config.options.output_directory = Some(directory.clone());
        }

        if let Some(delay) = self.delay {
            config.options.delay_seconds = delay;
        }

        if let Some(curl_file) = &self.curl_file {
            config.auth.curl_file = curl_file.clone();
        }
    }

    /// Resolve the requested index range.
    ///
    /// `--start` defaults to 1 and `--end` to the export's file count, so
    /// a bare `--continue` walks everything that remains.
    pub fn index_range(&self, total_expected_files: u64) -> (u64, u64) {
        (
            self.start.unwrap_or(1),
            self.end.unwrap_or(total_expected_files),
        )
    }
}
