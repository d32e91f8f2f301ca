//! Terminal outcomes of a download task.

use std::path::PathBuf;

/// Result of resolving one download task.
///
/// Every task ends in exactly one of these before the sequencer advances.
#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    /// Archive fully received and renamed into place.
    Success {
        bytes_written: u64,
        final_path: PathBuf,
    },

    /// A non-empty archive for this index already exists on disk.
    AlreadyExists { path: PathBuf },

    /// The session is stale: the service answered with markup (or an
    /// explicit auth status) where a binary archive was expected.
    AuthExpired,

    /// Network or server hiccup worth retrying (timeout, reset, 5xx).
    Transient(String),

    /// Environment or protocol condition that retrying will not fix
    /// (disk full, permission denied, unexpected 4xx).
    Fatal(String),
}

impl DownloadOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            DownloadOutcome::Success { .. } => "success",
            DownloadOutcome::AlreadyExists { .. } => "already-exists",
            DownloadOutcome::AuthExpired => "auth-expired",
            DownloadOutcome::Transient(_) => "transient",
            DownloadOutcome::Fatal(_) => "fatal",
        }
    }
}
