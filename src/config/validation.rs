//! Configuration and index-range validation logic.

use regex::Regex;

use crate::config::loader::Config;
use crate::error::{Error, Result};

/// Upper bound on the inter-download delay. Larger values are almost
/// certainly a typo (hours between archives).
const MAX_DELAY_SECONDS: u64 = 3600;

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_job_id(&config.export.job_id)?;

    if config.export.total_expected_files == 0 {
        return Err(Error::ConfigValidation {
            field: "total_expected_files".to_string(),
            message: "Export must contain at least one file".to_string(),
        });
    }

    if config.options.delay_seconds > MAX_DELAY_SECONDS {
        return Err(Error::ConfigValidation {
            field: "delay_seconds".to_string(),
            message: format!(
                "Delay must be at most {} seconds (got {})",
                MAX_DELAY_SECONDS, config.options.delay_seconds
            ),
        });
    }

    if config.options.request_timeout_seconds == 0 {
        return Err(Error::ConfigValidation {
            field: "request_timeout_seconds".to_string(),
            message: "Request timeout must be at least 1 second".to_string(),
        });
    }

    Ok(())
}

/// Validate the export job ID.
pub fn validate_job_id(job_id: &str) -> Result<()> {
    if job_id.is_empty() {
        return Err(Error::MissingConfig(
            "job_id (copy it from the 'j=' parameter of a download URL)".to_string(),
        ));
    }

    // Check for placeholder values
    let lower = job_id.to_lowercase();
    if lower.contains("replaceme") || lower.contains("your_job_id") {
        return Err(Error::ConfigValidation {
            field: "job_id".to_string(),
            message: "Job ID appears to be a placeholder. Please provide your actual export job ID."
                .to_string(),
        });
    }

    // Job IDs are UUIDs
    let uuid_pattern =
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
            .unwrap();
    if !uuid_pattern.is_match(job_id) {
        return Err(Error::ConfigValidation {
            field: "job_id".to_string(),
            message: format!("Job ID '{}' is not a valid UUID", job_id),
        });
    }

    Ok(())
}

/// Validate a requested index range against the export bounds.
///
/// Rejected before any I/O: `start` must not exceed `end`, indices start at
/// 1, and both ends must lie within the operator-supplied file count.
pub fn validate_range(start: u64, end: u64, total_expected_files: u64) -> Result<()> {
    if start < 1 {
        return Err(Error::InvalidRange {
            start,
            end,
            message: "Start index must be at least 1".to_string(),
        });
    }

    if start > end {
        return Err(Error::InvalidRange {
            start,
            end,
            message: "Start index must not exceed end index".to_string(),
        });
    }

    if end > total_expected_files {
        return Err(Error::InvalidRange {
            start,
            end,
            message: format!(
                "End index exceeds the export's file count ({})",
                total_expected_files
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB_ID: &str = "aad05205-2695-41f5-a4d7-b92d9a095d5e";

    #[test]
    fn test_valid_job_id() {
        assert!(validate_job_id(JOB_ID).is_ok());
    }

    #[test]
    fn test_job_id_missing() {
        assert!(matches!(validate_job_id(""), Err(Error::MissingConfig(_))));
    }

    #[test]
    fn test_job_id_placeholder() {
        assert!(validate_job_id("REPLACEME").is_err());
    }

    #[test]
    fn test_job_id_not_uuid() {
        assert!(validate_job_id("not-a-uuid").is_err());
    }

    #[test]
    fn test_valid_range() {
        assert!(validate_range(1, 277, 277).is_ok());
        assert!(validate_range(50, 52, 277).is_ok());
        assert!(validate_range(1, 1, 1).is_ok());
    }

    #[test]
    fn test_range_start_zero() {
        assert!(matches!(
            validate_range(0, 5, 277),
            Err(Error::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_range_start_after_end() {
        assert!(matches!(
            validate_range(10, 5, 277),
            Err(Error::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_range_beyond_total() {
        assert!(matches!(
            validate_range(1, 278, 277),
            Err(Error::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_validate_config_zero_total() {
        let mut config = Config::default();
        config.export.job_id = JOB_ID.to_string();
        config.export.total_expected_files = 0;
        assert!(validate_config(&config).is_err());
    }
}
