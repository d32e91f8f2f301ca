//! Per-index download task.

use std::path::PathBuf;

use crate::fs::naming::temp_filename;

/// One archive index scheduled for download.
///
/// Created by the sequencer for each index in the requested range that is
/// not already on disk, and destroyed once a terminal outcome is recorded.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    /// Archive index, 1-based.
    pub index: u64,

    /// Directory the archive is written into.
    pub output_dir: PathBuf,

    /// Attempts made so far for this index.
    pub attempt_count: u32,
}

impl DownloadTask {
    pub fn new(index: u64, output_dir: PathBuf) -> Self {
        Self {
            index,
            output_dir,
            attempt_count: 0,
        }
    }

    /// Path partial data is streamed to before the atomic rename.
    pub fn partial_path(&self) -> PathBuf {
        self.output_dir.join(temp_filename(self.index))
    }
}
