//! Request configuration and response types.

use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Callback invoked with `(bytes_sent, bytes_total)` while a file streams.
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Transport settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Timeout for metadata requests (login, listings).
    pub request_timeout: Duration,
    /// Timeout for multipart uploads.
    pub upload_timeout: Duration,
    /// Skip TLS certificate verification. Local/dev servers only.
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: crate::DEFAULT_REQUEST_TIMEOUT,
            upload_timeout: crate::DEFAULT_UPLOAD_TIMEOUT,
            accept_invalid_certs: false,
            user_agent: concat!("platup/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// An HTTP response of any status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts a non-2xx response into an [`ApiError`].
    ///
    /// 401 and 403 become [`ApiError::Auth`]; everything else
    /// [`ApiError::Server`]. The body is kept verbatim.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        match self.status {
            s if (200..300).contains(&s) => Ok(self),
            401 | 403 => Err(ApiError::Auth {
                status: self.status,
                body: self.body,
            }),
            _ => Err(ApiError::Server {
                status: self.status,
                body: self.body,
            }),
        }
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Parse {
            status: self.status,
            reason: e.to_string(),
            body: self.body.clone(),
        })
    }
}

/// The file section of a multipart upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Form field name (e.g. `file`).
    pub field_name: String,
    /// Local path streamed as the part body.
    pub path: PathBuf,
    /// File name advertised in `Content-Disposition`.
    pub file_name: String,
    pub content_type: String,
}

/// A multipart form: text fields followed by one streamed file.
#[derive(Debug, Clone)]
pub struct MultipartUpload {
    pub fields: Vec<(String, String)>,
    pub file: FilePart,
}

impl MultipartUpload {
    pub fn new(file: FilePart) -> Self {
        Self {
            fields: Vec::new(),
            file,
        }
    }

    /// Appends a text field. Fields are sent in insertion order.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Returns the value of a text field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}
