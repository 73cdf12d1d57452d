// Typed error taxonomy constructed at the request boundary.
//
// Downstream state machines branch on kind, never on transport library
// shapes: Transient is retry-safe, Expired means local identifiers are stale,
// Invalid means the request itself was wrong, Terminal means the remote
// computation reported failure.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Network failure, 5xx, or an undecodable body. Safe to retry for
    /// idempotent reads; surfaced only once retries are exhausted.
    #[error("{message}")]
    Transient { message: String },

    /// HTTP 404 - the identifier is unknown to the server (expired or never
    /// existed). Local state referencing it is stale, not failed.
    #[error("{message}")]
    Expired { message: String },

    /// Any other 4xx. Retrying the same request will not help.
    #[error("{message}")]
    Invalid { status: u16, message: String },

    /// The remote computation itself reported failure.
    #[error("{message}")]
    Terminal { message: String },
}

impl ApiError {
    pub fn transient(message: impl Into<String>) -> Self {
        ApiError::Transient {
            message: message.into(),
        }
    }

    pub fn expired(message: impl Into<String>) -> Self {
        ApiError::Expired {
            message: message.into(),
        }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        ApiError::Terminal {
            message: message.into(),
        }
    }

    /// Classify a non-2xx HTTP status.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            404 => ApiError::Expired { message },
            400..=499 => ApiError::Invalid { status, message },
            _ => ApiError::Transient { message },
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transient { .. })
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, ApiError::Expired { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Expired { .. } => Some(404),
            ApiError::Invalid { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Best-effort human-readable message from an error response body. The
/// server usually answers with `{"error": "..."}`; anything else falls back
/// to the raw body or the status code.
pub(crate) fn extract_error_message(body: &str, status: u16) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("error").and_then(|v| v.as_str()) {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("server returned status {}", status)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ApiError::from_status(404, "gone".into()).is_expired());
        assert!(matches!(
            ApiError::from_status(400, "bad".into()),
            ApiError::Invalid { status: 400, .. }
        ));
        assert!(ApiError::from_status(500, "boom".into()).is_transient());
        assert!(ApiError::from_status(503, "busy".into()).is_transient());
    }

    #[test]
    fn test_status_accessor() {
        assert_eq!(ApiError::from_status(404, "gone".into()).status(), Some(404));
        assert_eq!(ApiError::from_status(422, "bad".into()).status(), Some(422));
        assert_eq!(ApiError::transient("net down").status(), None);
    }

    #[test]
    fn test_extracts_json_error_field() {
        let message = extract_error_message(r#"{"error": "token rejected"}"#, 401);
        assert_eq!(message, "token rejected");
    }

    #[test]
    fn test_falls_back_to_raw_body() {
        assert_eq!(extract_error_message("plain text failure", 500), "plain text failure");
    }

    #[test]
    fn test_falls_back_to_status_code() {
        assert_eq!(extract_error_message("  ", 502), "server returned status 502");
    }
}
