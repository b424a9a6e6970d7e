//! Session error types.

use platup_transport::ApiError;

/// Errors from the credential store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors produced by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("credential store error: {0}")]
    Store(#[from] StoreError),

    #[error("not logged in")]
    NotLoggedIn,

    #[error("{0} must not be empty")]
    MissingField(&'static str),
}

impl SessionError {
    /// Returns true when the server rejected the credentials or token.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_auth())
    }

    /// Returns true when no response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_transport())
    }
}
