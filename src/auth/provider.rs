//! Credential provider trait and the capture-file implementation.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::auth::credentials::SessionCredentials;
use crate::auth::curl::parse_curl_capture;
use crate::error::{Error, Result};

/// Source of session credentials.
///
/// The sequencer only knows two operations: take a snapshot of the current
/// credentials, and ask for fresh ones after detecting session expiry. How
/// the refresh happens (re-pasted capture, browser automation) is entirely
/// the provider's business.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Get the current credentials.
    async fn current(&self) -> Result<SessionCredentials>;

    /// Obtain fresh credentials after session expiry.
    async fn refresh(&self) -> Result<SessionCredentials>;
}

/// Provider backed by a saved browser "Copy as cURL" capture file.
///
/// `refresh` runs the configured external command (typically a
/// browser-automation script that rewrites the capture file) and re-parses
/// the file. Without a command, it re-reads the file and fails if the rapt
/// token has not changed since the last parse.
pub struct CurlFileProvider {
    curl_file: PathBuf,
    refresh_command: Option<String>,
    cached: RwLock<Option<SessionCredentials>>,
}

impl CurlFileProvider {
    pub fn new(curl_file: PathBuf, refresh_command: Option<String>) -> Self {
        Self {
            curl_file,
            refresh_command,
            cached: RwLock::new(None),
        }
    }

    /// Read and parse the capture file.
    async fn read_capture(&self) -> Result<SessionCredentials> {
        let content = tokio::fs::read_to_string(&self.curl_file)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::Capture(format!(
                        "Capture file not found: {}. Save the download request \
                         as a cURL command there first.",
                        self.curl_file.display()
                    ))
                } else {
                    Error::Io(e)
                }
            })?;

        parse_curl_capture(&content)
    }

    /// Run the external refresh command, if configured.
    async fn run_refresh_command(&self, command: &str) -> Result<()> {
        tracing::info!("Running credential refresh command");

        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .status()
            .await
            .map_err(|e| Error::RefreshFailed(format!("Failed to spawn refresh command: {}", e)))?;

        if !status.success() {
            return Err(Error::RefreshFailed(format!(
                "Refresh command exited with {}",
                status
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl CredentialProvider for CurlFileProvider {
    async fn current(&self) -> Result<SessionCredentials> {
        {
            let cached = self.cached.read().await;
            if let Some(creds) = cached.as_ref() {
                return Ok(creds.clone());
            }
        }

        let creds = self.read_capture().await?;
        *self.cached.write().await = Some(creds.clone());
        Ok(creds)
    }

    async fn refresh(&self) -> Result<SessionCredentials> {
        let previous_rapt = {
            let cached = self.cached.read().await;
            cached.as_ref().map(|creds| creds.rapt.clone())
        };

        if let Some(command) = &self.refresh_command {
            self.run_refresh_command(command).await?;
        }

        let creds = self.read_capture().await?;

        // Without an external command there is nothing that could have
        // produced a new token; an unchanged capture means the session is
        // stale and retrying would loop on the same expired token.
        if self.refresh_command.is_none() && previous_rapt.as_deref() == Some(creds.rapt.as_str()) {
            return Err(Error::RefreshFailed(
                "Capture file unchanged; re-capture the download request in your browser"
                    .to_string(),
            ));
        }

        *self.cached.write().await = Some(creds.clone());
        Ok(creds)
    }
}
