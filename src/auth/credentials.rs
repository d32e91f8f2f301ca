//! Session credential snapshot.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

/// Authorization material for one download attempt.
///
/// Owned by the credential provider; the sequencer and fetcher only borrow a
/// snapshot per attempt and never inspect the contents beyond attaching them
/// to the request.
#[derive(Clone)]
pub struct SessionCredentials {
    /// HTTP headers captured from the browser session.
    pub headers: BTreeMap<String, String>,

    /// Cookies captured from the browser session.
    pub cookies: BTreeMap<String, String>,

    /// Re-auth proof token from the download URL.
    pub rapt: String,

    /// When this capture was taken.
    pub captured_at: DateTime<Utc>,
}

impl SessionCredentials {
    /// Render the cookies as a single `Cookie` header value.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// Credential values must never reach logs in plaintext, so Debug only
// reports shape.
impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("headers", &format!("<{} redacted>", self.headers.len()))
            .field("cookies", &format!("<{} redacted>", self.cookies.len()))
            .field("rapt", &"<redacted>")
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionCredentials {
        SessionCredentials {
            headers: BTreeMap::from([("user-agent".to_string(), "Mozilla/5.0".to_string())]),
            cookies: BTreeMap::from([
                ("SID".to_string(), "abc".to_string()),
                ("HSID".to_string(), "def".to_string()),
            ]),
            rapt: "secret-token".to_string(),
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_cookie_header() {
        assert_eq!(sample().cookie_header(), "HSID=def; SID=abc");
    }

    #[test]
    fn test_debug_redacts_values() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("secret-token"));
        assert!(!rendered.contains("abc"));
        assert!(rendered.contains("redacted"));
    }
}
