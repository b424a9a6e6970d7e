//! Platform session management.
//!
//! Holds the bearer token for the current user, exchanges credentials for
//! a token, validates stored tokens on startup and persists the session
//! through a [`CredentialStore`].
//!
//! Only authentication failures (401/403) invalidate a session. A
//! validation request that never gets a response leaves the session as it
//! was, so a flaky network does not log the user out.

mod error;
mod manager;
mod session;
mod store;

pub use error::{SessionError, StoreError};
pub use manager::SessionManager;
pub use session::{Session, User};
pub use store::{
    CredentialStore, FileCredentialStore, KEY_BASE_URL, KEY_LOGGED_IN, KEY_TOKEN, KEY_USERNAME,
    MemoryCredentialStore, default_credentials_path, platup_config_dir,
};
