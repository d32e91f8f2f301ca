//! Session credential handling.
//!
//! This module provides:
//! - The `SessionCredentials` snapshot attached to each download request
//! - The `CredentialProvider` trait the sequencer refreshes through
//! - A provider backed by a saved browser "Copy as cURL" capture

pub mod credentials;
pub mod curl;
pub mod provider;

pub use credentials::SessionCredentials;
pub use curl::parse_curl_capture;
pub use provider::{CredentialProvider, CurlFileProvider};
