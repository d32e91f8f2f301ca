//! Browser "Copy as cURL" capture parsing.
//!
//! The one-time credential capture flow: the user finds the `download=true`
//! request in their browser's network inspector, copies it as a cURL (bash)
//! command, and saves it to a text file. This module extracts the headers,
//! cookies, and rapt token from that command.

use std::collections::BTreeMap;

use chrono::Utc;
use regex::Regex;

use crate::auth::credentials::SessionCredentials;
use crate::error::{Error, Result};

/// Host the capture must target. Anything else is a copy-paste mistake.
const EXPORT_HOST: &str = "takeout.google.com";

/// Parse a saved cURL command into session credentials.
pub fn parse_curl_capture(curl_text: &str) -> Result<SessionCredentials> {
    if !curl_text.contains(EXPORT_HOST) {
        return Err(Error::Capture(format!(
            "Capture does not target {} (copy the download=true request as cURL)",
            EXPORT_HOST
        )));
    }

    let header_pattern = Regex::new(r"-H '([^:']+): ([^']+)'").unwrap();
    let mut headers = BTreeMap::new();
    for capture in header_pattern.captures_iter(curl_text) {
        headers.insert(capture[1].to_string(), capture[2].to_string());
    }

    let mut cookies = BTreeMap::new();
    let cookie_pattern = Regex::new(r"-b '([^']+)'").unwrap();
    if let Some(capture) = cookie_pattern.captures(curl_text) {
        for pair in capture[1].split("; ") {
            if let Some((name, value)) = pair.split_once('=') {
                cookies.insert(name.to_string(), value.to_string());
            }
        }
    }

    // Browsers sometimes emit the cookies as a header instead of -b
    if cookies.is_empty() {
        if let Some(cookie_header) = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("cookie"))
            .map(|(_, value)| value.clone())
        {
            for pair in cookie_header.split("; ") {
                if let Some((name, value)) = pair.split_once('=') {
                    cookies.insert(name.to_string(), value.to_string());
                }
            }
        }
    }

    let rapt_pattern = Regex::new(r"rapt=([^&\s']+)").unwrap();
    let rapt = rapt_pattern
        .captures(curl_text)
        .map(|capture| capture[1].to_string())
        .ok_or_else(|| {
            Error::Capture("No rapt token found in capture".to_string())
        })?;

    Ok(SessionCredentials {
        headers,
        cookies,
        rapt,
        captured_at: Utc::now(),
    })
}
