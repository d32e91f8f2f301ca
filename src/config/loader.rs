//! Configuration structures and loading logic.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub options: OptionsConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

/// Export job configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// The export job ID, taken from the service's download URL.
    #[serde(default)]
    pub job_id: String,

    /// Total number of archive files in the export.
    /// Index ranges are validated against this bound.
    #[serde(default = "default_total_files")]
    pub total_expected_files: u64,
}

/// Download options configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsConfig {
    /// Directory where archives are written.
    #[serde(default)]
    pub output_directory: Option<PathBuf>,

    /// Seconds to wait between consecutive downloads.
    #[serde(default = "default_delay")]
    pub delay_seconds: u64,

    /// Attempts per index before a transient failure becomes permanent.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request I/O timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Whether to show download progress bars.
    #[serde(default = "default_true")]
    pub show_downloads: bool,
}

/// Credential source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Path to the saved "Copy as cURL" capture of a download request.
    #[serde(default = "default_curl_file")]
    pub curl_file: PathBuf,

    /// Optional external command run to refresh the capture file when the
    /// session expires (e.g. a browser-automation script). The command must
    /// rewrite `curl_file` with a fresh capture.
    #[serde(default)]
    pub refresh_command: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            job_id: String::new(),
            total_expected_files: default_total_files(),
        }
    }
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            output_directory: None,
            delay_seconds: default_delay(),
            max_retries: default_max_retries(),
            request_timeout_seconds: default_request_timeout(),
            show_downloads: true,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            curl_file: default_curl_file(),
            refresh_command: None,
        }
    }
}

fn default_total_files() -> u64 {
    277
}

fn default_delay() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_curl_file() -> PathBuf {
    PathBuf::from("curl.txt")
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "Configuration file not found: {}. Create one from config.example.toml",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the effective output directory.
    pub fn output_directory(&self) -> PathBuf {
        self.options
            .output_directory
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}
