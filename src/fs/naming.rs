//! Archive filename generation and parsing.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::Result;

/// Archive filename pattern. The index group is at least three digits:
/// `{:03}` widens past 999, so exports larger than that still round-trip.
fn archive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^takeout-\d{8}T\d{6}Z-(\d{3,})\.zip$").unwrap())
}

/// Generate the final archive filename for an index.
///
/// Format: `takeout-<YYYYMMDDTHHMMSSZ>-<index, zero-padded to 3>.zip`,
/// where the timestamp is the UTC time of successful retrieval.
pub fn archive_filename(index: u64, retrieved_at: DateTime<Utc>) -> String {
    format!(
        "takeout-{}-{:03}.zip",
        retrieved_at.format("%Y%m%dT%H%M%SZ"),
        index
    )
}

/// Generate the in-progress temp filename for an index. Partial downloads
/// only ever live under this name, never the final one.
pub fn temp_filename(index: u64) -> String {
    format!("takeout-{:03}.zip.part", index)
}

/// Extract the archive index from a filename, if it matches the naming
/// convention.
pub fn index_from_filename(filename: &str) -> Option<u64> {
    archive_pattern()
        .captures(filename)
        .and_then(|capture| capture[1].parse().ok())
}

/// Find a non-empty archive already on disk for the given index.
///
/// Empty files are ignored so an interrupted or zero-byte artifact does not
/// mask a needed download.
pub fn existing_archive(output_dir: &Path, index: u64) -> Result<Option<PathBuf>> {
    if !output_dir.exists() {
        return Ok(None);
    }

    for entry in std::fs::read_dir(output_dir)? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };

        if index_from_filename(filename) == Some(index) && entry.metadata()?.len() > 0 {
            return Ok(Some(path));
        }
    }

    Ok(None)
}
