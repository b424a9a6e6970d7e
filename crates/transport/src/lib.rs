//! HTTP transport for the platform API.
//!
//! Thin async layer over `reqwest` that every other crate talks through.
//! It knows nothing about sessions or catalogs; callers pass the bearer
//! token and full URL per request.
//!
//! Two timeout classes exist: a short one for metadata calls (login,
//! listings) and a long one for binary uploads. A request that receives
//! *any* HTTP status returns a [`Response`]; only failures without a
//! response surface as [`TransportError`]. Mapping statuses to
//! [`ApiError`] is left to the caller via [`Response::error_for_status`].

mod client;
mod error;
mod types;

#[cfg(any(test, feature = "mock-server"))]
pub mod mock;

pub use client::{Transport, endpoint};
pub use error::{ApiError, TransportError};
pub use reqwest::Method;
pub use types::{FilePart, MultipartUpload, ProgressCallback, Response, TransportConfig};

/// Default timeout for metadata requests.
pub const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Default timeout for binary uploads.
pub const DEFAULT_UPLOAD_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);
