use platup_transport::ApiError;

/// Errors from catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("not logged in")]
    NotLoggedIn,

    #[error("unknown organization: {0}")]
    UnknownOrganization(String),

    #[error("unknown application: {0}")]
    UnknownApplication(String),
}

impl CatalogError {
    /// The underlying API error, if the server was involved.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.as_api().is_some_and(ApiError::is_auth)
    }
}
