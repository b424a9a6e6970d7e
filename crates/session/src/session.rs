//! Session value and the server's user payloads.

use serde::{Deserialize, Serialize};

/// Authentication state for one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub base_url: String,
    pub auth_token: String,
    pub username: String,
    pub logged_in: bool,
}

impl Session {
    /// A logged-out session pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Token to send as `Authorization: Bearer`, if any.
    pub fn bearer(&self) -> Option<&str> {
        (!self.auth_token.is_empty()).then_some(self.auth_token.as_str())
    }

    /// Logged in with a non-empty token.
    pub fn is_authenticated(&self) -> bool {
        self.logged_in && !self.auth_token.is_empty()
    }

    /// Full URL for an API path on this session's platform.
    pub fn endpoint(&self, path: &str) -> String {
        platup_transport::endpoint(&self.base_url, path)
    }

    pub(crate) fn clear_token(&mut self) {
        self.auth_token.clear();
        self.logged_in = false;
    }
}

/// A platform user. Only `username` is relied upon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UserPayload")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
}

/// Wire form of [`User`]. Servers send `id`, `_id` or both, and `null`
/// for fields they do not fill in.
#[derive(Deserialize)]
struct UserPayload {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "_id")]
    object_id: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserPayload> for User {
    fn from(p: UserPayload) -> Self {
        Self {
            id: p.id.or(p.object_id).unwrap_or_default(),
            username: p.username.unwrap_or_default(),
            email: p.email.unwrap_or_default(),
        }
    }
}

/// `POST /api/auth/login` response body.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// `GET /api/auth/me` body: either `{user:{...}}` or the user itself.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum MeResponse {
    Wrapped { user: User },
    Bare(User),
}

impl MeResponse {
    pub fn into_username(self) -> Option<String> {
        let user = match self {
            Self::Wrapped { user } | Self::Bare(user) => user,
        };
        (!user.username.is_empty()).then_some(user.username)
    }
}
