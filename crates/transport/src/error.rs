//! Transport and API error types.

use std::path::PathBuf;
use std::time::Duration;

/// A request that never produced an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("request cancelled")]
    Cancelled,

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Classifies a `reqwest` failure, separating timeouts from the rest.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(err)
        }
    }
}

/// Errors from a platform API call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("authentication failed (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    #[error("server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    #[error("invalid response (HTTP {status}): {reason}")]
    Parse {
        status: u16,
        reason: String,
        body: String,
    },
}

impl ApiError {
    /// Returns true for 401/403 responses.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Returns true when no response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// HTTP status, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Server { status, .. } | Self::Parse { status, .. } => {
                Some(*status)
            }
            Self::Transport(_) => None,
        }
    }

    /// Raw response body, if a response was received.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Auth { body, .. } | Self::Server { body, .. } | Self::Parse { body, .. } => {
                Some(body)
            }
            Self::Transport(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_accessors() {
        let err = ApiError::Auth {
            status: 401,
            body: "nope".into(),
        };
        assert!(err.is_auth());
        assert!(!err.is_transport());
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.body(), Some("nope"));
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn transport_error_has_no_status() {
        let err = ApiError::from(TransportError::Cancelled);
        assert!(err.is_transport());
        assert_eq!(err.status(), None);
        assert_eq!(err.body(), None);
    }

    #[test]
    fn parse_error_keeps_status_and_body() {
        let err = ApiError::Parse {
            status: 200,
            reason: "missing token".into(),
            body: "{}".into(),
        };
        assert!(!err.is_auth());
        assert_eq!(err.status(), Some(200));
        assert_eq!(err.body(), Some("{}"));
        assert!(err.to_string().contains("HTTP 200"));
    }

    #[test]
    fn timeout_message_mentions_duration() {
        let err = TransportError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30s"));
    }
}
