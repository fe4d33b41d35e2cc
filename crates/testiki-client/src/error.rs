//! Mapping of HTTP failures onto the engine's error taxonomy.

use reqwest::StatusCode;
use testiki_core::TestError;

/// Classify a transport-level failure (no HTTP response received).
pub(crate) fn from_transport(err: &reqwest::Error, timeout_secs: u64) -> TestError {
    if err.is_timeout() {
        TestError::Unreachable(format!("request timed out after {timeout_secs}s"))
    } else if err.is_connect() {
        TestError::Unreachable(format!("connection failed: {err}"))
    } else {
        TestError::Unreachable(format!("network error: {err}"))
    }
}

/// Classify a non-success HTTP status.
///
/// `subject` names what was requested, for `NotFound` messages.
pub(crate) fn from_status(status: StatusCode, body: &str, subject: &str) -> TestError {
    let message = server_message(body).unwrap_or_else(|| body.trim().to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TestError::Unauthorized(if message.is_empty() {
            status.to_string()
        } else {
            message
        }),
        StatusCode::NOT_FOUND => TestError::NotFound(subject.to_string()),
        _ => TestError::Unreachable(format!("HTTP {}: {message}", status.as_u16())),
    }
}

/// The backend reports failures as `{"error": "..."}`.
fn server_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("error")?
        .as_str()
        .map(str::to_string)
}
