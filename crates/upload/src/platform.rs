//! Client facade over one platform.
//!
//! Owns the transport, session, catalog and orchestrator so an auth
//! failure from any protected call can log out and drop the catalog in
//! one place.

use std::path::PathBuf;

use platup_archive::{ArchiveOptions, BuildArtifact, spawn_build};
use platup_catalog::{Application, Catalog, Organization};
use platup_session::{CredentialStore, Session, SessionManager};
use platup_transport::{Transport, TransportConfig};
use tracing::{info, warn};

use crate::error::PlatformError;
use crate::orchestrator::{PreparedUpload, UploadOrchestrator};
use crate::types::{UploadMode, UploadOutcome, UploadRequest};

pub struct Platform {
    transport: Transport,
    sessions: SessionManager,
    catalog: Catalog,
    uploader: UploadOrchestrator,
}

impl Platform {
    /// Creates a logged-out client. Call [`start`](Self::start) to restore
    /// a persisted session.
    pub fn new(
        config: TransportConfig,
        store: Box<dyn CredentialStore>,
        default_base_url: impl Into<String>,
    ) -> Result<Self, PlatformError> {
        let transport = Transport::new(config)?;
        Ok(Self {
            sessions: SessionManager::new(transport.clone(), store, default_base_url),
            uploader: UploadOrchestrator::new(transport.clone()),
            catalog: Catalog::new(),
            transport,
        })
    }

    pub fn session(&self) -> &Session {
        self.sessions.session()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Orchestrator access for events, cancellation and cleanup settings.
    pub fn uploader(&mut self) -> &mut UploadOrchestrator {
        &mut self.uploader
    }

    /// Loads stored credentials without contacting the server.
    pub fn load(&mut self) -> &Session {
        self.sessions.load_credentials()
    }

    /// Restores the stored session, validating its token, and loads the
    /// organizations if it is still good.
    pub async fn start(&mut self) -> Result<&Session, PlatformError> {
        let restored = self.sessions.restore().await.map(|_| ());
        self.guard(restored)?;
        if self.session().is_authenticated() {
            self.load_organizations().await?;
        }
        Ok(self.session())
    }

    /// Logs in and loads the organizations.
    ///
    /// Only an auth failure while loading the organizations fails the
    /// login. Any other listing failure is logged and the session is kept.
    pub async fn login(
        &mut self,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<&Session, PlatformError> {
        self.sessions.login(base_url, username, password).await?;
        self.catalog.clear();
        self.load_organizations().await?;
        Ok(self.session())
    }

    async fn load_organizations(&mut self) -> Result<(), PlatformError> {
        match self.refresh_organizations().await {
            Ok(_) => Ok(()),
            Err(e) if e.is_auth() => Err(e),
            Err(e) => {
                warn!(error = %e, "failed to load organizations");
                Ok(())
            }
        }
    }

    /// Ends the session and forgets the catalog.
    pub fn logout(&mut self) -> &Session {
        self.catalog.clear();
        self.sessions.logout()
    }

    /// Confirms the token with the server.
    pub async fn validate(&mut self) -> Result<&Session, PlatformError> {
        let validated = self.sessions.validate_token().await.map(|_| ());
        self.guard(validated)?;
        Ok(self.session())
    }

    pub async fn refresh_organizations(&mut self) -> Result<&[Organization], PlatformError> {
        let fetched = self
            .catalog
            .fetch_organizations(&self.transport, self.sessions.session())
            .await
            .map(|_| ());
        self.guard(fetched)?;
        Ok(self.catalog.organizations())
    }

    /// Loads applications of `organization_id`, or of the selected
    /// organization when `None`.
    pub async fn refresh_applications(
        &mut self,
        organization_id: Option<&str>,
    ) -> Result<&[Application], PlatformError> {
        let org = match organization_id {
            Some(id) => id.to_string(),
            None => self
                .catalog
                .selected_organization()
                .map(|o| o.id.clone())
                .ok_or_else(|| {
                    crate::UploadError::Validation("no organization selected".into())
                })?,
        };
        let fetched = self
            .catalog
            .fetch_applications(&self.transport, self.sessions.session(), &org)
            .await
            .map(|_| ());
        self.guard(fetched)?;
        Ok(self.catalog.applications())
    }

    pub fn select_organization(&mut self, id: &str) -> Result<&Organization, PlatformError> {
        Ok(self.catalog.select_organization(id)?)
    }

    pub fn select_application(
        &mut self,
        id: Option<&str>,
    ) -> Result<Option<&Application>, PlatformError> {
        Ok(self.catalog.select_application(id)?)
    }

    /// Zips a build directory on the blocking pool.
    pub async fn build_archive(
        &self,
        source_dir: PathBuf,
        dest_path: PathBuf,
        options: ArchiveOptions,
        progress: impl FnMut(f64) + Send + 'static,
    ) -> Result<BuildArtifact, PlatformError> {
        Ok(spawn_build(source_dir, dest_path, options, progress).await?)
    }

    /// Validates the request and checks the archive size without sending.
    pub async fn prepare_upload(
        &self,
        request: &UploadRequest,
    ) -> Result<PreparedUpload, PlatformError> {
        Ok(self.uploader.prepare(request, &self.catalog).await?)
    }

    /// Sends a prepared upload. A version update refreshes the
    /// application list afterwards.
    pub async fn send_upload(
        &mut self,
        prepared: PreparedUpload,
    ) -> Result<UploadOutcome, PlatformError> {
        let org = prepared.request.organization_id.clone();
        let is_update = matches!(prepared.request.mode, UploadMode::Update { .. });

        let sent = self.uploader.send(prepared, self.sessions.session()).await;
        let outcome = self.guard(sent)?;

        if is_update {
            if let Err(e) = self.refresh_applications(Some(&org)).await {
                warn!(error = %e, "failed to refresh applications after update");
            }
        }
        Ok(outcome)
    }

    /// Prepares and sends, proceeding past size warnings.
    pub async fn upload(&mut self, request: &UploadRequest) -> Result<UploadOutcome, PlatformError> {
        let prepared = self.prepare_upload(request).await?;
        self.send_upload(prepared).await
    }

    /// Logs out on an auth failure, then passes the result through.
    fn guard<T, E: Into<PlatformError>>(&mut self, result: Result<T, E>) -> Result<T, PlatformError> {
        result.map_err(|e| {
            let err: PlatformError = e.into();
            if err.is_auth() && self.sessions.session().logged_in {
                info!("session rejected by server; logging out");
                self.logout();
            } else if err.is_auth() {
                self.catalog.clear();
            }
            err
        })
    }
}
