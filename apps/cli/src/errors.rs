//! CLI error kinds and exit codes.

use std::error::Error;
use std::fmt;

use platup_archive::ArchiveError;
use platup_catalog::CatalogError;
use platup_session::{SessionError, StoreError};
use platup_transport::{ApiError, TransportError};
use platup_upload::{PlatformError, UploadError};

#[derive(thiserror::Error, Debug)]
pub enum CliErrorKind {
    #[error("usage error: {0}")]
    Usage(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication error: {0}")]
    Auth(String),
}

impl CliErrorKind {
    pub fn code(&self) -> i32 {
        match self {
            Self::Usage(_) => USAGE,
            Self::Config(_) => CONFIG,
            Self::Io(_) => IO,
            Self::Network(_) => NETWORK,
            Self::Auth(_) => AUTH,
        }
    }
}

pub const USAGE: i32 = 2;
pub const CONFIG: i32 = 10;
pub const RUNTIME: i32 = 20;
pub const IO: i32 = 30;
pub const NETWORK: i32 = 40;
pub const AUTH: i32 = 50;

#[derive(Debug)]
pub struct CliError {
    pub kind: CliErrorKind,
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl CliError {
    pub fn new(kind: CliErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub fn with_source<E: Into<anyhow::Error>>(kind: CliErrorKind, err: E) -> Self {
        Self {
            kind,
            source: Some(err.into()),
        }
    }
}

/// Maps an error chain to a process exit code.
///
/// The first link with a known type decides. Unknown errors are runtime
/// failures.
pub fn classify_exit_code(e: &anyhow::Error) -> i32 {
    let mut cur: &(dyn Error + 'static) = e.as_ref();
    loop {
        if let Some(code) = known_code(cur) {
            tracing::debug!(code, "classified error");
            return code;
        }
        match cur.source() {
            Some(src) => cur = src,
            None => return RUNTIME,
        }
    }
}

fn known_code(err: &(dyn Error + 'static)) -> Option<i32> {
    if let Some(e) = err.downcast_ref::<CliError>() {
        return Some(e.kind.code());
    }
    if let Some(e) = err.downcast_ref::<PlatformError>() {
        return Some(platform_code(e));
    }
    if let Some(e) = err.downcast_ref::<SessionError>() {
        return Some(session_code(e));
    }
    if let Some(e) = err.downcast_ref::<CatalogError>() {
        return Some(catalog_code(e));
    }
    if let Some(e) = err.downcast_ref::<UploadError>() {
        return Some(upload_code(e));
    }
    if let Some(e) = err.downcast_ref::<ArchiveError>() {
        return Some(archive_code(e));
    }
    if let Some(e) = err.downcast_ref::<ApiError>() {
        return Some(api_code(e));
    }
    if let Some(e) = err.downcast_ref::<TransportError>() {
        return Some(transport_code(e));
    }
    if err.downcast_ref::<std::io::Error>().is_some() {
        return Some(IO);
    }
    None
}

fn platform_code(e: &PlatformError) -> i32 {
    match e {
        PlatformError::Transport(e) => transport_code(e),
        PlatformError::Session(e) => session_code(e),
        PlatformError::Catalog(e) => catalog_code(e),
        PlatformError::Archive(e) => archive_code(e),
        PlatformError::Upload(e) => upload_code(e),
    }
}

fn session_code(e: &SessionError) -> i32 {
    match e {
        SessionError::Api(e) => api_code(e),
        SessionError::Store(StoreError::Io(_)) => IO,
        SessionError::Store(StoreError::Json(_)) => CONFIG,
        SessionError::NotLoggedIn => AUTH,
        SessionError::MissingField(_) => USAGE,
    }
}

fn catalog_code(e: &CatalogError) -> i32 {
    match e {
        CatalogError::Api(e) => api_code(e),
        CatalogError::NotLoggedIn => AUTH,
        CatalogError::UnknownOrganization(_) | CatalogError::UnknownApplication(_) => USAGE,
    }
}

fn upload_code(e: &UploadError) -> i32 {
    match e {
        UploadError::Validation(_) | UploadError::PayloadTooLarge { .. } => USAGE,
        UploadError::NotLoggedIn => AUTH,
        UploadError::Io { .. } => IO,
        UploadError::Api(e) => api_code(e),
        UploadError::Cancelled => RUNTIME,
    }
}

fn archive_code(e: &ArchiveError) -> i32 {
    match e {
        ArchiveError::EmptySource(_) => USAGE,
        ArchiveError::Io { .. } | ArchiveError::Zip(_) => IO,
    }
}

fn api_code(e: &ApiError) -> i32 {
    match e {
        ApiError::Transport(e) => transport_code(e),
        ApiError::Auth { .. } => AUTH,
        ApiError::Server { .. } | ApiError::Parse { .. } => RUNTIME,
    }
}

fn transport_code(e: &TransportError) -> i32 {
    match e {
        TransportError::Io { .. } => IO,
        TransportError::Build(_) => CONFIG,
        TransportError::Cancelled => RUNTIME,
        TransportError::Timeout(_) | TransportError::Network(_) => NETWORK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn cli_error_kinds() {
        let e: anyhow::Error = CliError::new(CliErrorKind::Config("bad".into())).into();
        assert_eq!(classify_exit_code(&e), CONFIG);
    }

    #[test]
    fn nested_auth_error() {
        let e: anyhow::Error = PlatformError::Session(SessionError::Api(ApiError::Auth {
            status: 401,
            body: String::new(),
        }))
        .into();
        assert_eq!(classify_exit_code(&e), AUTH);
    }

    #[test]
    fn timeout_is_network() {
        let e: anyhow::Error = PlatformError::Catalog(CatalogError::Api(ApiError::Transport(
            TransportError::Timeout(std::time::Duration::from_secs(30)),
        )))
        .into();
        assert_eq!(classify_exit_code(&e), NETWORK);
    }

    #[test]
    fn validation_is_usage() {
        let e: anyhow::Error =
            PlatformError::Upload(UploadError::Validation("no changelog".into())).into();
        assert_eq!(classify_exit_code(&e), USAGE);
    }

    #[test]
    fn server_error_is_runtime() {
        let e: anyhow::Error = PlatformError::Upload(UploadError::Api(ApiError::Server {
            status: 500,
            body: "boom".into(),
        }))
        .into();
        assert_eq!(classify_exit_code(&e), RUNTIME);
    }

    #[test]
    fn io_error_under_context() {
        let r: Result<(), std::io::Error> = Err(std::io::Error::other("disk"));
        let e = r.context("writing file").unwrap_err();
        assert_eq!(classify_exit_code(&e), IO);
    }

    #[test]
    fn unknown_is_runtime() {
        let e = anyhow::anyhow!("something odd");
        assert_eq!(classify_exit_code(&e), RUNTIME);
    }
}
