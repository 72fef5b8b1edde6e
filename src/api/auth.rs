//! Request signing and header utilities.

use md5::{Digest, Md5};
use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::session::Session;

/// Headers a desktop browser sends on XHR requests.
pub const BROWSER_HEADERS: &[(&str, &str)] = &[
    ("Accept", "*/*"),
    ("Accept-Language", "en-US,en;q=0.9"),
    ("X-Requested-With", "XMLHttpRequest"),
    ("X-IG-App-ID", "936619743392459"),
    ("Referer", "https://www.instagram.com/"),
    ("Origin", "https://www.instagram.com"),
];

/// Compute the `X-Instagram-Gis` header for an anonymous GraphQL query.
///
/// Format: md5_hex(rhx_gis + ":" + variables)
pub fn gis_signature(rhx_gis: &str, variables: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(rhx_gis.as_bytes());
    hasher.update(b":");
    hasher.update(variables.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Pull the `window._sharedData` object out of a page.
pub fn extract_shared_data(html: &str) -> Result<Value> {
    let pattern = Regex::new(r"window\._sharedData\s*=\s*(\{.+?\});\s*</script>")
        .map_err(|e| Error::MalformedResponse(format!("bad shared data pattern: {}", e)))?;

    let captures = pattern
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| Error::MalformedResponse("window._sharedData not found".into()))?;

    serde_json::from_str(captures.as_str())
        .map_err(|e| Error::MalformedResponse(format!("window._sharedData is not JSON: {}", e)))
}

/// The `rhx_gis` signing key from shared data. Newer pages no longer carry
/// one, in which case the empty key is used.
pub fn rhx_gis(shared_data: &Value) -> String {
    shared_data
        .get("rhx_gis")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Headers derived from a session: cookies and the CSRF token.
pub fn session_headers(session: &Session) -> Vec<(String, String)> {
    let mut headers = Vec::with_capacity(2);
    if !session.cookies.is_empty() {
        headers.push(("Cookie".to_string(), session.cookie_header()));
    }
    if !session.csrf_token.is_empty() {
        headers.push(("X-CSRFToken".to_string(), session.csrf_token.clone()));
    }
    headers
}
