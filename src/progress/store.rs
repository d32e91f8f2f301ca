//! Atomic JSON persistence for run progress.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Progress file name, fixed relative to the output directory.
pub const PROGRESS_FILE_NAME: &str = "takeout-progress.json";

/// Durable record of a download run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Highest index with a fully written archive. Only ever increases.
    pub last_completed_index: u64,

    /// Operator-supplied file count the run was validated against.
    pub total_expected_files: u64,

    /// When the run this record belongs to started.
    pub run_started_at: DateTime<Utc>,

    /// Indices that permanently failed. Excluded from "completed" but not
    /// retried automatically on resume.
    #[serde(default)]
    pub failed_indices: BTreeSet<u64>,
}

impl ProgressRecord {
    /// Create a fresh record for a new run.
    pub fn new(total_expected_files: u64) -> Self {
        Self {
            last_completed_index: 0,
            total_expected_files,
            run_started_at: Utc::now(),
            failed_indices: BTreeSet::new(),
        }
    }

    /// Record a completed index. The completion point never moves backwards,
    /// and a success clears any failure recorded for the index by an
    /// earlier run (an index is never both completed and failed).
    pub fn mark_completed(&mut self, index: u64) {
        self.last_completed_index = self.last_completed_index.max(index);
        self.failed_indices.remove(&index);
    }

    /// Record a permanently failed index.
    pub fn mark_failed(&mut self, index: u64) {
        self.failed_indices.insert(index);
    }
}

/// File-backed progress store.
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    /// Create a store at the well-known location inside the output directory.
    pub fn in_directory(output_dir: &Path) -> Self {
        Self {
            path: output_dir.join(PROGRESS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the prior record, if any. A missing file means "no prior run"
    /// and is not an error.
    pub fn load(&self) -> Result<Option<ProgressRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        let record: ProgressRecord = serde_json::from_str(&content).map_err(|e| {
            Error::Progress(format!(
                "Corrupt progress file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(Some(record))
    }

    /// Persist the record atomically: write to a temp file next to the
    /// final one, then rename, so a crash mid-write cannot corrupt the
    /// resume point.
    pub fn save(&self, record: &ProgressRecord) -> Result<()> {
        let content = serde_json::to_string_pretty(record)?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}
