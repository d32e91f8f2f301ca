//! Authenticated per-index archive fetching.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{header, Client, Response, StatusCode};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::auth::SessionCredentials;
use crate::config::Config;
use crate::download::outcome::DownloadOutcome;
use crate::download::task::DownloadTask;
use crate::error::{Error, Result};
use crate::fs::naming::archive_filename;

/// Export service download endpoint.
const DOWNLOAD_URL: &str = "https://takeout.google.com/settings/takeout/download";

/// Minimum file size to show a progress bar (20 MB).
const PROGRESS_THRESHOLD: u64 = 20 * 1024 * 1024;

/// One authenticated download attempt for one archive index.
///
/// All failures are encoded in the returned outcome; the sequencer decides
/// what each class means for the run.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, task: &DownloadTask, credentials: &SessionCredentials)
        -> DownloadOutcome;
}

/// HTTP implementation of [`Fetch`] against the export service.
pub struct HttpFetcher {
    client: Client,
    base_url: String,
    job_id: String,
    show_progress: bool,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.options.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(
                config.options.request_timeout_seconds.min(10),
            ))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: DOWNLOAD_URL.to_string(),
            job_id: config.export.job_id.clone(),
            show_progress: config.options.show_downloads,
        })
    }

    /// Point the fetcher at a different endpoint (tests only).
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Build the per-index download URL.
    fn build_download_url(&self, index: u64, rapt: &str) -> Result<Url> {
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("i", index.to_string().as_str()),
                ("j", self.job_id.as_str()),
                ("download", "true"),
                ("rapt", rapt),
            ],
        )?;
        Ok(url)
    }

    /// Attach the captured headers and cookies verbatim.
    fn build_headers(&self, credentials: &SessionCredentials) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();

        for (name, value) in &credentials.headers {
            if name.eq_ignore_ascii_case("cookie") {
                continue;
            }

            let name = match header::HeaderName::try_from(name.as_str()) {
                Ok(name) => name,
                Err(_) => {
                    tracing::debug!("Skipping invalid header name from capture: {}", name);
                    continue;
                }
            };
            let value = match header::HeaderValue::try_from(value.as_str()) {
                Ok(value) => value,
                Err(_) => {
                    tracing::debug!("Skipping invalid header value from capture");
                    continue;
                }
            };
            headers.insert(name, value);
        }

        if !credentials.cookies.is_empty() {
            if let Ok(value) = header::HeaderValue::try_from(credentials.cookie_header()) {
                headers.insert(header::COOKIE, value);
            }
        }

        headers
    }

    /// Classify the response status and content type, or pass the response
    /// through for streaming.
    fn classify_response(response: &Response) -> Option<DownloadOutcome> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Some(DownloadOutcome::AuthExpired);
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Some(DownloadOutcome::Transient(format!("HTTP {}", status)));
        }

        if !status.is_success() {
            return Some(DownloadOutcome::Fatal(format!("HTTP {}", status)));
        }

        // A markup payload where a binary archive was expected is the
        // canonical signature of session expiry on this service.
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if is_markup(content_type) {
            return Some(DownloadOutcome::AuthExpired);
        }

        None
    }

    /// Stream the response body to the partial file.
    async fn write_body(&self, response: Response, partial_path: &Path) -> DownloadOutcome {
        let content_length = response.content_length();
        let show_progress = self.show_progress
            && content_length
                .map(|len| len > PROGRESS_THRESHOLD)
                .unwrap_or(false);

        let progress = if show_progress {
            let bar = ProgressBar::new(content_length.unwrap_or(0));
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(bar)
        } else {
            None
        };

        let mut file = match File::create(partial_path).await {
            Ok(file) => file,
            Err(e) => return DownloadOutcome::Fatal(format!("Cannot create file: {}", e)),
        };

        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return DownloadOutcome::Transient(format!("Stream error: {}", e)),
            };

            if let Err(e) = file.write_all(&chunk).await {
                return DownloadOutcome::Fatal(format!("Local write failed: {}", e));
            }
            written += chunk.len() as u64;

            if let Some(ref bar) = progress {
                bar.set_position(written);
            }
        }

        if let Err(e) = file.flush().await {
            return DownloadOutcome::Fatal(format!("Local write failed: {}", e));
        }

        if let Some(bar) = progress {
            bar.finish_and_clear();
        }

        // A short body with a matching connection close looks like success
        // to the stream loop; the advertised length catches it.
        if let Some(expected) = content_length {
            if written != expected {
                return DownloadOutcome::Transient(format!(
                    "Size mismatch: expected {} bytes, received {}",
                    expected, written
                ));
            }
        }

        DownloadOutcome::Success {
            bytes_written: written,
            final_path: PathBuf::new(),
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(
        &self,
        task: &DownloadTask,
        credentials: &SessionCredentials,
    ) -> DownloadOutcome {
        let url = match self.build_download_url(task.index, &credentials.rapt) {
            Ok(url) => url,
            Err(e) => return DownloadOutcome::Fatal(format!("Bad download URL: {}", e)),
        };

        tracing::debug!("GET {} (attempt {})", url.path(), task.attempt_count + 1);

        let response = match self
            .client
            .get(url)
            .headers(self.build_headers(credentials))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return DownloadOutcome::Transient(format!("Request timed out: {}", e))
            }
            Err(e) => return DownloadOutcome::Transient(format!("Request failed: {}", e)),
        };

        if let Some(outcome) = Self::classify_response(&response) {
            return outcome;
        }

        let partial_path = task.partial_path();
        let outcome = self.write_body(response, &partial_path).await;

        match outcome {
            DownloadOutcome::Success { bytes_written, .. } => {
                let final_path = task
                    .output_dir
                    .join(archive_filename(task.index, chrono::Utc::now()));

                // Atomic rename: a partial file must never appear under the
                // final name.
                if let Err(e) = tokio::fs::rename(&partial_path, &final_path).await {
                    remove_partial(&partial_path).await;
                    return DownloadOutcome::Fatal(format!("Cannot finalize archive: {}", e));
                }

                DownloadOutcome::Success {
                    bytes_written,
                    final_path,
                }
            }
            other => {
                remove_partial(&partial_path).await;
                other
            }
        }
    }
}

/// True if the content type indicates markup/text instead of an archive.
fn is_markup(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("html") || content_type.starts_with("text/")
}

/// Best-effort removal of a partial file. The partial name is outside the
/// archive naming convention, so a leftover cannot be mistaken for a
/// completed download.
async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Could not remove partial file {}: {}", path.display(), e);
        }
    }
}
