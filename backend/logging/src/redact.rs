//! Log Redaction Layer
//!
//! Scrubs API keys and bearer tokens from strings prior to logging.
//! Provider error bodies and URLs pass through here before they reach `tracing`.

use once_cell::sync::Lazy;
use regex::Regex;

static GOOGLE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"AIza[0-9A-Za-z\-_]{20,}").expect("valid google key regex"));
static BEARER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Bearer\s+[a-zA-Z0-9\-\._~+/]+=*").expect("valid bearer regex"));
static KEY_PARAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([?&]key=)[^&\s]+").expect("valid key param regex"));

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = GOOGLE_KEY_RE.replace_all(input, "[REDACTED_KEY]");
    let redacted = BEARER_RE.replace_all(&redacted, "[REDACTED_TOKEN]");
    KEY_PARAM_RE
        .replace_all(&redacted, "${1}[REDACTED_KEY]")
        .into_owned()
}
