//! Error taxonomy for a CleverTap read.
//!
//! Every failure aborts the current stream's read and surfaces to the caller.
//! Callers branch on the variant (or on [`SyncError::kind`]) instead of
//! matching message text.

use serde_json::Value;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Top-level error for a stream read or connection check.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or malformed configuration, detected before any network call.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Non-2xx response or network failure. Never retried.
    #[error("transport error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// CleverTap reported a failure other than "still processing".
    #[error("CleverTap API returned error status: {body}")]
    RemoteApi { body: Value },

    /// A success body was missing a field the protocol requires.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The export job was still processing after the retry budget ran out.
    #[error("max retries reached after {attempts} attempts, API still not ready: {body}")]
    RetryExhausted { attempts: u32, body: Value },
}

impl SyncError {
    /// Stable tag for logs and harness messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Configuration(_) => "configuration_error",
            SyncError::Transport { .. } => "transport_error",
            SyncError::RemoteApi { .. } => "remote_api_error",
            SyncError::Protocol(_) => "protocol_error",
            SyncError::RetryExhausted { .. } => "retry_exhausted_error",
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Configuration problems found by the session configurator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required config field: {field}")]
    MissingField { field: &'static str },

    #[error("{field} must be an integer in YYYYMMDD format, got {value}")]
    InvalidDate { field: &'static str, value: String },

    #[error("start_date must be less than or equal to end_date ({start} > {end})")]
    InvalidWindow { start: u32, end: u32 },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_tags() {
        let err = SyncError::from(ConfigError::MissingField { field: "passcode" });
        assert_eq!(err.kind(), "configuration_error");
        assert!(err.to_string().contains("passcode"));

        let err = SyncError::Protocol("no cursor returned".to_string());
        assert_eq!(err.kind(), "protocol_error");

        let err = SyncError::RetryExhausted {
            attempts: 10,
            body: json!({"status": "fail", "code": 2}),
        };
        assert_eq!(err.kind(), "retry_exhausted_error");
        assert!(err.to_string().contains("10 attempts"));
    }

    #[test]
    fn test_transport_display_includes_status() {
        let err = SyncError::Transport {
            status: Some(401),
            message: "Unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "transport error (HTTP 401): Unauthorized");

        let err = SyncError::Transport {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "transport error: connection refused");
    }

    #[test]
    fn test_remote_api_carries_body() {
        let body = json!({"status": "fail", "error": "Invalid passcode"});
        let err = SyncError::RemoteApi { body: body.clone() };
        assert_eq!(err.kind(), "remote_api_error");
        assert!(err.to_string().contains("Invalid passcode"));
        match err {
            SyncError::RemoteApi { body: b } => assert_eq!(b, body),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
