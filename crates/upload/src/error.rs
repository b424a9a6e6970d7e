//! Upload and facade error types.

use std::path::PathBuf;

use platup_archive::ArchiveError;
use platup_catalog::CatalogError;
use platup_session::SessionError;
use platup_transport::{ApiError, TransportError};

/// Errors from a single upload attempt.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid upload request: {0}")]
    Validation(String),

    #[error("archive is {size} bytes, above the {limit} byte upload limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("not logged in")]
    NotLoggedIn,

    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("upload cancelled")]
    Cancelled,
}

impl UploadError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_auth())
    }
}

/// Errors surfaced by [`Platform`](crate::Platform).
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl PlatformError {
    /// True when the server rejected the session's token.
    pub fn is_auth(&self) -> bool {
        match self {
            Self::Session(e) => e.is_auth(),
            Self::Catalog(e) => e.is_auth(),
            Self::Upload(e) => e.is_auth(),
            Self::Transport(_) | Self::Archive(_) => false,
        }
    }
}
