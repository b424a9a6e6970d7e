//! Login, token validation and logout.

use platup_transport::{ApiError, Response, Transport};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::session::{LoginResponse, MeResponse, Session};
use crate::store::{CredentialStore, KEY_BASE_URL, KEY_LOGGED_IN, KEY_TOKEN, KEY_USERNAME};

const LOGIN_PATH: &str = "/api/auth/login";
const ME_PATH: &str = "/api/auth/me";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Owns the current [`Session`] and its persistence.
pub struct SessionManager {
    transport: Transport,
    store: Box<dyn CredentialStore>,
    session: Session,
    default_base_url: String,
}

impl SessionManager {
    /// Creates a manager with a logged-out session on `default_base_url`.
    ///
    /// Call [`restore`](Self::restore) to pick up persisted credentials.
    pub fn new(
        transport: Transport,
        store: Box<dyn CredentialStore>,
        default_base_url: impl Into<String>,
    ) -> Self {
        let default_base_url = default_base_url.into();
        Self {
            transport,
            store,
            session: Session::new(default_base_url.clone()),
            default_base_url,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Replaces the session with what the store holds.
    ///
    /// A missing base URL falls back to the default one.
    pub fn load_credentials(&mut self) -> &Session {
        let base_url = self
            .store
            .get(KEY_BASE_URL)
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.default_base_url.clone());

        self.session = Session {
            base_url,
            auth_token: self.store.get(KEY_TOKEN).unwrap_or_default(),
            username: self.store.get(KEY_USERNAME).unwrap_or_default(),
            logged_in: self.store.get(KEY_LOGGED_IN).as_deref() == Some("true"),
        };
        debug!(
            base_url = %self.session.base_url,
            username = %self.session.username,
            logged_in = self.session.logged_in,
            "credentials loaded"
        );
        &self.session
    }

    /// Writes the four session keys to the store.
    pub fn save_credentials(&self) -> Result<(), SessionError> {
        let s = &self.session;
        self.store.set(KEY_BASE_URL, &s.base_url)?;
        self.store.set(KEY_USERNAME, &s.username)?;
        if s.auth_token.is_empty() {
            self.store.remove(KEY_TOKEN)?;
        } else {
            self.store.set(KEY_TOKEN, &s.auth_token)?;
        }
        self.store
            .set(KEY_LOGGED_IN, if s.logged_in { "true" } else { "false" })?;
        self.store.flush()?;
        Ok(())
    }

    /// Startup path: loads stored credentials and, if they claim a live
    /// session, validates the token before trusting it.
    pub async fn restore(&mut self) -> Result<&Session, SessionError> {
        self.load_credentials();
        if self.session.logged_in && !self.session.auth_token.is_empty() {
            self.validate_token().await?;
        } else if self.session.logged_in {
            // Flag without a token is stale.
            self.session.logged_in = false;
        }
        Ok(&self.session)
    }

    /// Exchanges a username and password for a token.
    ///
    /// On any failure the current session is left as it was.
    pub async fn login(
        &mut self,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<&Session, SessionError> {
        if base_url.trim().is_empty() {
            return Err(SessionError::MissingField("base URL"));
        }
        if username.is_empty() {
            return Err(SessionError::MissingField("username"));
        }
        if password.is_empty() {
            return Err(SessionError::MissingField("password"));
        }

        let url = platup_transport::endpoint(base_url, LOGIN_PATH);
        info!(%url, username, "logging in");

        let resp = self
            .transport
            .post_json(&url, &LoginRequest { username, password }, None)
            .await
            .map_err(ApiError::from)?
            .error_for_status()?;

        let parsed: LoginResponse = resp.json()?;
        let token = parsed
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| parse_error("login response has no token", &resp))?;
        let name = parsed
            .user
            .map(|u| u.username)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| parse_error("login response has no user.username", &resp))?;

        self.session = Session {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: token,
            username: name,
            logged_in: true,
        };
        self.persist();
        info!(username = %self.session.username, "login successful");
        Ok(&self.session)
    }

    /// Confirms the stored token with the server.
    ///
    /// 401/403 logs the session out. A request that gets no response
    /// leaves the session untouched. Other statuses are returned as errors
    /// without changing state.
    pub async fn validate_token(&mut self) -> Result<&Session, SessionError> {
        let Some(token) = self.session.bearer().map(str::to_owned) else {
            return Err(SessionError::NotLoggedIn);
        };
        let url = self.session.endpoint(ME_PATH);

        let resp = match self.transport.get(&url, Some(&token)).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "token validation got no response; keeping session");
                return Err(ApiError::from(e).into());
            }
        };

        let resp = match resp.error_for_status() {
            Ok(resp) => resp,
            Err(err) if err.is_auth() => {
                info!(status = ?err.status(), "token rejected; logging out");
                self.logout();
                return Err(err.into());
            }
            Err(err) => {
                warn!(status = ?err.status(), "token validation failed");
                return Err(err.into());
            }
        };

        match resp.json::<MeResponse>().ok().and_then(MeResponse::into_username) {
            Some(name) => self.session.username = name,
            None => warn!("could not read username from validation response; keeping previous"),
        }
        self.session.logged_in = true;
        self.persist();
        debug!(username = %self.session.username, "token valid");
        Ok(&self.session)
    }

    /// Clears the token and the logged-in flag. The username is kept.
    pub fn logout(&mut self) -> &Session {
        self.session.clear_token();
        if let Err(e) = self
            .store
            .remove(KEY_TOKEN)
            .and_then(|_| self.store.set(KEY_LOGGED_IN, "false"))
            .and_then(|_| self.store.flush())
        {
            warn!(error = %e, "failed to persist logout");
        }
        info!(username = %self.session.username, "logged out");
        &self.session
    }

    /// Logs out if `err` is an authentication failure. Returns whether it did.
    pub fn handle_auth_failure(&mut self, err: &ApiError) -> bool {
        if err.is_auth() && self.session.logged_in {
            info!(status = ?err.status(), "request rejected as unauthorized; logging out");
            self.logout();
            true
        } else {
            false
        }
    }

    fn persist(&self) {
        if let Err(e) = self.save_credentials() {
            warn!(error = %e, "failed to persist credentials");
        }
    }
}

fn parse_error(reason: &str, resp: &Response) -> ApiError {
    ApiError::Parse {
        status: resp.status,
        reason: reason.into(),
        body: resp.body.clone(),
    }
}
