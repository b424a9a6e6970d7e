//! Upload orchestrator.
//!
//! Drives one upload through `Preparing -> SizeChecked -> Sending ->
//! Completed | Failed`, emitting an [`UploadEvent`] per transition.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use platup_catalog::Catalog;
use platup_session::Session;
use platup_transport::{
    ApiError, FilePart, Method, MultipartUpload, ProgressCallback, Transport, TransportError,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::UploadError;
use crate::types::{
    MAX_UPLOAD_BYTES, SizeWarning, UploadEvent, UploadMode, UploadOutcome, UploadPhase,
    UploadRequest, WARN_UPLOAD_BYTES,
};

const APPLICATIONS_PATH: &str = "/api/applications";
const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// A request that passed validation and the size check.
#[derive(Debug, Clone)]
pub struct PreparedUpload {
    pub request: UploadRequest,
    pub size_bytes: u64,
    pub warnings: Vec<SizeWarning>,
}

/// Runs uploads and reports their progress.
///
/// Events are only delivered once [`take_events`](Self::take_events) has
/// been called.
pub struct UploadOrchestrator {
    transport: Transport,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
    cleanup_on_success: bool,
}

impl UploadOrchestrator {
    pub fn new(transport: Transport) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            transport,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
            cleanup_on_success: true,
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns the token that cancels the in-flight upload.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Replaces a cancelled token so later uploads can run.
    pub fn reset_cancellation(&mut self) {
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
    }

    /// Delete the archive and build directory after a successful upload.
    /// On by default.
    pub fn set_cleanup_on_success(&mut self, cleanup: bool) {
        self.cleanup_on_success = cleanup;
    }

    pub fn cleanup_on_success(&self) -> bool {
        self.cleanup_on_success
    }

    /// Runs the `Preparing` and `SizeChecked` phases.
    ///
    /// Nothing is sent. The returned warnings let a caller decide whether
    /// to go ahead with [`send`](Self::send).
    pub async fn prepare(
        &self,
        request: &UploadRequest,
        catalog: &Catalog,
    ) -> Result<PreparedUpload, UploadError> {
        self.emit(UploadEvent::Phase(UploadPhase::Preparing)).await;
        let size = match self.validate(request, catalog).await {
            Ok(size) => size,
            Err(e) => return Err(self.fail(e).await),
        };

        self.emit(UploadEvent::Phase(UploadPhase::SizeChecked)).await;
        if size > MAX_UPLOAD_BYTES {
            return Err(self
                .fail(UploadError::PayloadTooLarge {
                    size,
                    limit: MAX_UPLOAD_BYTES,
                })
                .await);
        }

        let mut warnings = Vec::new();
        if size > WARN_UPLOAD_BYTES {
            let warning = SizeWarning {
                size_bytes: size,
                threshold_bytes: WARN_UPLOAD_BYTES,
            };
            warn!(bytes = size, "{warning}");
            self.emit(UploadEvent::Warning(warning)).await;
            warnings.push(warning);
        }

        debug!(archive = %request.archive_path.display(), bytes = size, "upload prepared");
        Ok(PreparedUpload {
            request: request.clone(),
            size_bytes: size,
            warnings,
        })
    }

    /// Runs the `Sending` phase and, on success, `Completed`.
    pub async fn send(
        &self,
        prepared: PreparedUpload,
        session: &Session,
    ) -> Result<UploadOutcome, UploadError> {
        match self.send_inner(prepared, session).await {
            Ok(outcome) => {
                self.emit(UploadEvent::Phase(UploadPhase::Completed)).await;
                self.emit(UploadEvent::Completed {
                    application_id: outcome.application_id.clone(),
                })
                .await;
                Ok(outcome)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Prepares and sends in one go, proceeding past size warnings.
    ///
    /// After a version update the catalog's application list is refreshed.
    pub async fn upload(
        &self,
        request: &UploadRequest,
        session: &Session,
        catalog: &mut Catalog,
    ) -> Result<UploadOutcome, UploadError> {
        let prepared = self.prepare(request, catalog).await?;
        let outcome = self.send(prepared, session).await?;

        if matches!(request.mode, UploadMode::Update { .. }) {
            if let Err(e) = catalog
                .fetch_applications(&self.transport, session, &request.organization_id)
                .await
            {
                warn!(error = %e, "failed to refresh applications after update");
            }
        }
        Ok(outcome)
    }

    async fn validate(&self, request: &UploadRequest, catalog: &Catalog) -> Result<u64, UploadError> {
        if request.name.trim().is_empty() {
            return Err(invalid("application name is required"));
        }
        if request.organization_id.is_empty() {
            return Err(invalid("an organization must be selected"));
        }
        if catalog.find_organization(&request.organization_id).is_none() {
            return Err(invalid(format!(
                "organization {} is not in the loaded list",
                request.organization_id
            )));
        }

        if let UploadMode::Update {
            application_id,
            changelog,
        } = &request.mode
        {
            if application_id.is_empty() {
                return Err(invalid("an application must be selected for an update"));
            }
            if changelog.trim().is_empty() {
                return Err(invalid("a changelog is required for an update"));
            }
            let listed = catalog.applications_organization() == Some(request.organization_id.as_str())
                && catalog.find_application(application_id).is_some();
            if !listed {
                return Err(invalid(format!(
                    "application {application_id} is not in the loaded list for organization {}",
                    request.organization_id
                )));
            }
        }

        let path = &request.archive_path;
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| invalid(format!("archive {} does not exist", path.display())))?;
        if !metadata.is_file() {
            return Err(invalid(format!("archive {} is not a file", path.display())));
        }
        if metadata.len() == 0 {
            return Err(invalid(format!("archive {} is empty", path.display())));
        }
        Ok(metadata.len())
    }

    async fn send_inner(
        &self,
        prepared: PreparedUpload,
        session: &Session,
    ) -> Result<UploadOutcome, UploadError> {
        let token = session.bearer().ok_or(UploadError::NotLoggedIn)?;
        let PreparedUpload {
            request,
            size_bytes,
            warnings,
        } = prepared;

        self.emit(UploadEvent::Phase(UploadPhase::Sending)).await;

        let url = match &request.mode {
            UploadMode::Create => session.endpoint(APPLICATIONS_PATH),
            UploadMode::Update { application_id, .. } => session.endpoint(&format!(
                "{APPLICATIONS_PATH}/{}/versions",
                utf8_percent_encode(application_id, NON_ALPHANUMERIC)
            )),
        };
        let form = multipart_form(&request);

        info!(
            %url,
            name = %request.name,
            organization = %request.organization_id,
            bytes = size_bytes,
            "uploading build"
        );

        let resp = self
            .transport
            .send_multipart(
                Method::POST,
                &url,
                form,
                Some(token),
                self.progress_callback(),
                &self.cancel,
            )
            .await
            .map_err(|e| match e {
                TransportError::Cancelled => UploadError::Cancelled,
                other => UploadError::Api(ApiError::Transport(other)),
            })?;

        let status = resp.status;
        let resp = resp.error_for_status()?;

        let application_id = extract_application_id(&resp.body).or_else(|| match &request.mode {
            UploadMode::Update { application_id, .. } => Some(application_id.clone()),
            UploadMode::Create => None,
        });
        info!(status, application = ?application_id, "upload accepted");

        let cleaned_up = if self.cleanup_on_success {
            cleanup(&request.archive_path, request.build_dir.as_deref()).await
        } else {
            false
        };

        Ok(UploadOutcome {
            application_id,
            status,
            body: resp.body,
            warnings,
            cleaned_up,
        })
    }

    fn progress_callback(&self) -> Option<ProgressCallback> {
        if !self.listening() {
            return None;
        }
        let tx = self.events_tx.clone();
        let last = AtomicU64::new(u64::MAX);
        Some(Box::new(move |sent: u64, total: u64| {
            let percent = if total == 0 {
                100.0
            } else {
                sent as f64 * 100.0 / total as f64
            };
            // One event per whole percent.
            let whole = percent.floor() as u64;
            if last.swap(whole, Ordering::Relaxed) == whole {
                return;
            }
            let status = format!(
                "{:.1} / {:.1} MiB",
                sent as f64 / (1024.0 * 1024.0),
                total as f64 / (1024.0 * 1024.0)
            );
            let _ = tx.try_send(UploadEvent::Progress { percent, status });
        }))
    }

    fn listening(&self) -> bool {
        self.events_rx.is_none() && !self.events_tx.is_closed()
    }

    async fn emit(&self, event: UploadEvent) {
        if self.listening() {
            let _ = self.events_tx.send(event).await;
        }
    }

    async fn fail(&self, err: UploadError) -> UploadError {
        error!(error = %err, "upload failed");
        self.emit(UploadEvent::Phase(UploadPhase::Failed)).await;
        self.emit(UploadEvent::Failed {
            error: err.to_string(),
        })
        .await;
        err
    }
}

fn invalid(msg: impl Into<String>) -> UploadError {
    UploadError::Validation(msg.into())
}

fn multipart_form(request: &UploadRequest) -> MultipartUpload {
    let file_name = request
        .archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "build.zip".to_string());

    let mut form = MultipartUpload::new(FilePart {
        field_name: "file".into(),
        path: request.archive_path.clone(),
        file_name,
        content_type: ARCHIVE_CONTENT_TYPE.into(),
    })
    .text("name", request.name.trim())
    .text("description", request.description.as_str());

    match &request.mode {
        UploadMode::Create => {
            form = form
                .text("organizationId", request.organization_id.as_str())
                .text("isPublic", request.is_public.to_string());
        }
        UploadMode::Update { changelog, .. } => {
            form = form
                .text("isPublic", request.is_public.to_string())
                .text("changelog", changelog.as_str());
        }
    }
    form
}

/// Deletes the archive and build directory. Returns true if both are gone.
async fn cleanup(archive: &Path, build_dir: Option<&Path>) -> bool {
    let mut ok = true;
    match tokio::fs::remove_file(archive).await {
        Ok(()) => debug!(path = %archive.display(), "deleted archive"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %archive.display(), error = %e, "failed to delete archive");
            ok = false;
        }
    }
    if let Some(dir) = build_dir {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => debug!(path = %dir.display(), "deleted build directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to delete build directory");
                ok = false;
            }
        }
    }
    ok
}

/// Pulls the application id out of an upload response.
///
/// Accepts `{id}`, `{_id}` and the same nested under `application` or
/// `data`. Numeric ids are returned as strings.
pub fn extract_application_id(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    find_id(&value)
}

fn find_id(value: &Value) -> Option<String> {
    let obj = value.as_object()?;
    for key in ["id", "_id"] {
        match obj.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    ["application", "data"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(find_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    use platup_transport::TransportConfig;
    use platup_transport::mock::{MockResponse, MockServer, RecordedRequest};
    use tempfile::TempDir;

    fn transport() -> Transport {
        Transport::new(TransportConfig::default()).unwrap()
    }

    fn session(base_url: &str) -> Session {
        Session {
            base_url: base_url.into(),
            auth_token: "t1".into(),
            username: "alice".into(),
            logged_in: true,
        }
    }

    /// Catalog holding org `o1` and, for it, application `a1`.
    async fn loaded_catalog() -> Catalog {
        let server = MockServer::start(vec![
            MockResponse::ok(r#"[{"_id":"o1","name":"Acme"}]"#),
            MockResponse::ok(r#"[{"_id":"a1","name":"Game","version":"1.0.0"}]"#),
        ])
        .await;
        let (t, s) = (transport(), session(server.url()));
        let mut catalog = Catalog::new();
        catalog.fetch_organizations(&t, &s).await.unwrap();
        catalog.fetch_applications(&t, &s, "o1").await.unwrap();
        catalog
    }

    struct Fixture {
        _tmp: TempDir,
        build_dir: PathBuf,
        archive: PathBuf,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let build_dir = tmp.path().join("Builds").join("WebGL");
        fs::create_dir_all(&build_dir).unwrap();
        fs::write(build_dir.join("index.html"), "<html>").unwrap();
        let archive = tmp.path().join("Builds").join("App.zip");
        fs::write(&archive, vec![1u8; 2048]).unwrap();
        Fixture {
            _tmp: tmp,
            build_dir,
            archive,
        }
    }

    fn create_request(fx: &Fixture) -> UploadRequest {
        UploadRequest {
            name: "My Game".into(),
            description: "A game".into(),
            organization_id: "o1".into(),
            is_public: true,
            archive_path: fx.archive.clone(),
            build_dir: Some(fx.build_dir.clone()),
            mode: UploadMode::Create,
        }
    }

    fn update_request(fx: &Fixture, changelog: &str) -> UploadRequest {
        UploadRequest {
            mode: UploadMode::Update {
                application_id: "a1".into(),
                changelog: changelog.into(),
            },
            ..create_request(fx)
        }
    }

    /// Value of a multipart text field in a recorded request body.
    fn form_field(req: &RecordedRequest, name: &str) -> Option<String> {
        let body = req.body_text();
        let marker = format!("name=\"{name}\"\r\n\r\n");
        let start = body.find(&marker)? + marker.len();
        let end = body[start..].find("\r\n")?;
        Some(body[start..start + end].to_string())
    }

    fn drain(rx: &mut mpsc::Receiver<UploadEvent>) -> Vec<UploadEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    fn phases(events: &[UploadEvent]) -> Vec<UploadPhase> {
        events
            .iter()
            .filter_map(|e| match e {
                UploadEvent::Phase(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn create_upload_sends_form_and_cleans_up() {
        let fx = fixture();
        let catalog = loaded_catalog().await;
        let server = MockServer::start(vec![MockResponse::ok(r#"{"id":"a9"}"#)]).await;
        let mut orch = UploadOrchestrator::new(transport());
        let mut rx = orch.take_events().unwrap();

        let prepared = orch.prepare(&create_request(&fx), &catalog).await.unwrap();
        assert!(prepared.warnings.is_empty());
        let outcome = orch.send(prepared, &session(server.url())).await.unwrap();

        assert_eq!(outcome.application_id.as_deref(), Some("a9"));
        assert_eq!(outcome.status, 200);
        assert!(outcome.cleaned_up);
        assert!(!fx.archive.exists());
        assert!(!fx.build_dir.exists());

        let req = &server.requests()[0];
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/api/applications");
        assert_eq!(req.header("authorization"), Some("Bearer t1"));
        assert_eq!(form_field(req, "name").as_deref(), Some("My Game"));
        assert_eq!(form_field(req, "description").as_deref(), Some("A game"));
        assert_eq!(form_field(req, "organizationId").as_deref(), Some("o1"));
        assert_eq!(form_field(req, "isPublic").as_deref(), Some("true"));
        assert!(form_field(req, "changelog").is_none());
        assert!(req.body_text().contains(r#"filename="App.zip""#));
        assert!(req.body_text().contains("Content-Type: application/zip"));

        let events = drain(&mut rx);
        assert_eq!(
            phases(&events),
            [
                UploadPhase::Preparing,
                UploadPhase::SizeChecked,
                UploadPhase::Sending,
                UploadPhase::Completed
            ]
        );
        assert!(events.iter().any(|e| matches!(e, UploadEvent::Progress { .. })));
        assert!(matches!(
            events.last(),
            Some(UploadEvent::Completed { application_id: Some(id) }) if id == "a9"
        ));
    }

    #[tokio::test]
    async fn update_posts_new_version_with_changelog() {
        let fx = fixture();
        let mut catalog = loaded_catalog().await;
        let server = MockServer::start(vec![
            MockResponse::ok(r#"{"application":{"_id":"a1","version":"1.1.0"}}"#),
            MockResponse::ok(r#"[{"_id":"a1","name":"Game","version":"1.1.0"}]"#),
        ])
        .await;
        let orch = UploadOrchestrator::new(transport());

        let outcome = orch
            .upload(&update_request(&fx, "Fixed jumps"), &session(server.url()), &mut catalog)
            .await
            .unwrap();

        assert_eq!(outcome.application_id.as_deref(), Some("a1"));
        let reqs = server.requests();
        assert_eq!(reqs[0].path, "/api/applications/a1/versions");
        assert_eq!(reqs[0].method, "POST");
        assert_eq!(form_field(&reqs[0], "changelog").as_deref(), Some("Fixed jumps"));
        assert!(form_field(&reqs[0], "organizationId").is_none());

        assert_eq!(reqs[1].path, "/api/applications?organizationId=o1");
        assert_eq!(catalog.find_application("a1").unwrap().version, "1.1.0");
    }

    #[tokio::test]
    async fn update_escapes_application_id_in_path() {
        let fx = fixture();
        let lists = MockServer::start(vec![
            MockResponse::ok(r#"[{"_id":"o1","name":"Acme"}]"#),
            MockResponse::ok(r#"[{"_id":"a1/beta x","name":"Game"}]"#),
        ])
        .await;
        let (t, s) = (transport(), session(lists.url()));
        let mut catalog = Catalog::new();
        catalog.fetch_organizations(&t, &s).await.unwrap();
        catalog.fetch_applications(&t, &s, "o1").await.unwrap();

        let server = MockServer::start(vec![MockResponse::ok(r#"{"id":"a1/beta x"}"#)]).await;
        let orch = UploadOrchestrator::new(transport());
        let request = UploadRequest {
            mode: UploadMode::Update {
                application_id: "a1/beta x".into(),
                changelog: "Fixes".into(),
            },
            ..create_request(&fx)
        };

        let prepared = orch.prepare(&request, &catalog).await.unwrap();
        orch.send(prepared, &session(server.url())).await.unwrap();

        assert_eq!(
            server.requests()[0].path,
            "/api/applications/a1%2Fbeta%20x/versions"
        );
    }

    #[tokio::test]
    async fn update_without_changelog_sends_nothing() {
        let fx = fixture();
        let catalog = loaded_catalog().await;
        let server = MockServer::start(vec![]).await;
        let mut orch = UploadOrchestrator::new(transport());
        let mut rx = orch.take_events().unwrap();

        let err = orch
            .prepare(&update_request(&fx, "  "), &catalog)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Validation(_)));
        assert_eq!(server.request_count(), 0);
        assert_eq!(
            phases(&drain(&mut rx)),
            [UploadPhase::Preparing, UploadPhase::Failed]
        );
    }

    #[tokio::test]
    async fn unknown_organization_is_rejected() {
        let fx = fixture();
        let catalog = loaded_catalog().await;
        let orch = UploadOrchestrator::new(transport());
        let request = UploadRequest {
            organization_id: "o2".into(),
            ..create_request(&fx)
        };
        let err = orch.prepare(&request, &catalog).await.unwrap_err();
        assert!(matches!(err, UploadError::Validation(msg) if msg.contains("o2")));
    }

    #[tokio::test]
    async fn unknown_application_is_rejected() {
        let fx = fixture();
        let catalog = loaded_catalog().await;
        let orch = UploadOrchestrator::new(transport());
        let request = UploadRequest {
            mode: UploadMode::Update {
                application_id: "a7".into(),
                changelog: "x".into(),
            },
            ..create_request(&fx)
        };
        assert!(matches!(
            orch.prepare(&request, &catalog).await,
            Err(UploadError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let fx = fixture();
        let catalog = loaded_catalog().await;
        let orch = UploadOrchestrator::new(transport());
        let request = UploadRequest {
            name: " ".into(),
            ..create_request(&fx)
        };
        assert!(matches!(
            orch.prepare(&request, &catalog).await,
            Err(UploadError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn missing_or_empty_archive_is_rejected() {
        let fx = fixture();
        let catalog = loaded_catalog().await;
        let orch = UploadOrchestrator::new(transport());

        fs::write(&fx.archive, b"").unwrap();
        let err = orch.prepare(&create_request(&fx), &catalog).await.unwrap_err();
        assert!(matches!(err, UploadError::Validation(msg) if msg.contains("empty")));

        fs::remove_file(&fx.archive).unwrap();
        let err = orch.prepare(&create_request(&fx), &catalog).await.unwrap_err();
        assert!(matches!(err, UploadError::Validation(msg) if msg.contains("does not exist")));
    }

    #[tokio::test]
    async fn oversized_archive_is_refused_before_sending() {
        let fx = fixture();
        let catalog = loaded_catalog().await;
        let server = MockServer::start(vec![]).await;
        fs::File::create(&fx.archive)
            .unwrap()
            .set_len(101 * 1024 * 1024)
            .unwrap();
        let mut orch = UploadOrchestrator::new(transport());
        let mut rx = orch.take_events().unwrap();

        let err = orch.prepare(&create_request(&fx), &catalog).await.unwrap_err();

        assert!(matches!(
            err,
            UploadError::PayloadTooLarge { size, limit }
                if size == 101 * 1024 * 1024 && limit == MAX_UPLOAD_BYTES
        ));
        assert_eq!(server.request_count(), 0);
        assert_eq!(
            phases(&drain(&mut rx)),
            [
                UploadPhase::Preparing,
                UploadPhase::SizeChecked,
                UploadPhase::Failed
            ]
        );
    }

    #[tokio::test]
    async fn large_archive_proceeds_with_warning() {
        let fx = fixture();
        let catalog = loaded_catalog().await;
        fs::File::create(&fx.archive)
            .unwrap()
            .set_len(60 * 1024 * 1024)
            .unwrap();
        let mut orch = UploadOrchestrator::new(transport());
        let mut rx = orch.take_events().unwrap();

        let prepared = orch.prepare(&create_request(&fx), &catalog).await.unwrap();

        assert_eq!(prepared.size_bytes, 60 * 1024 * 1024);
        assert_eq!(prepared.warnings.len(), 1);
        assert_eq!(prepared.warnings[0].threshold_bytes, WARN_UPLOAD_BYTES);
        assert!(
            drain(&mut rx)
                .iter()
                .any(|e| matches!(e, UploadEvent::Warning(_)))
        );
    }

    #[tokio::test]
    async fn server_error_keeps_artifacts() {
        let fx = fixture();
        let catalog = loaded_catalog().await;
        let server =
            MockServer::start(vec![MockResponse::json(422, r#"{"error":"bad zip"}"#)]).await;
        let mut orch = UploadOrchestrator::new(transport());
        let mut rx = orch.take_events().unwrap();

        let prepared = orch.prepare(&create_request(&fx), &catalog).await.unwrap();
        let err = orch.send(prepared, &session(server.url())).await.unwrap_err();

        match err {
            UploadError::Api(api) => {
                assert_eq!(api.status(), Some(422));
                assert_eq!(api.body(), Some(r#"{"error":"bad zip"}"#));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(fx.archive.exists());
        assert!(fx.build_dir.exists());
        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(UploadEvent::Failed { error }) if error.contains("422")));
    }

    #[tokio::test]
    async fn unauthorized_upload_is_auth_error() {
        let fx = fixture();
        let catalog = loaded_catalog().await;
        let server = MockServer::start(vec![MockResponse::json(401, "expired")]).await;
        let orch = UploadOrchestrator::new(transport());

        let prepared = orch.prepare(&create_request(&fx), &catalog).await.unwrap();
        let err = orch.send(prepared, &session(server.url())).await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn cancel_aborts_in_flight_upload() {
        let fx = fixture();
        let catalog = loaded_catalog().await;
        let server = MockServer::start(vec![MockResponse::stall()]).await;
        let orch = UploadOrchestrator::new(transport());
        let token = orch.cancel_token();

        let prepared = orch.prepare(&create_request(&fx), &catalog).await.unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });
        let err = orch.send(prepared, &session(server.url())).await.unwrap_err();

        assert!(matches!(err, UploadError::Cancelled));
        assert!(fx.archive.exists());
    }

    #[tokio::test]
    async fn reset_cancellation_allows_next_upload() {
        let fx = fixture();
        let catalog = loaded_catalog().await;
        let server = MockServer::start(vec![MockResponse::ok(r#"{"_id":"a2"}"#)]).await;
        let mut orch = UploadOrchestrator::new(transport());
        orch.cancel_token().cancel();
        orch.reset_cancellation();

        let prepared = orch.prepare(&create_request(&fx), &catalog).await.unwrap();
        let outcome = orch.send(prepared, &session(server.url())).await.unwrap();
        assert_eq!(outcome.application_id.as_deref(), Some("a2"));
    }

    #[tokio::test]
    async fn cleanup_can_be_disabled() {
        let fx = fixture();
        let catalog = loaded_catalog().await;
        let server = MockServer::start(vec![MockResponse::ok("{}")]).await;
        let mut orch = UploadOrchestrator::new(transport());
        orch.set_cleanup_on_success(false);

        let prepared = orch.prepare(&create_request(&fx), &catalog).await.unwrap();
        let outcome = orch.send(prepared, &session(server.url())).await.unwrap();

        assert!(!outcome.cleaned_up);
        assert!(outcome.application_id.is_none());
        assert!(fx.archive.exists());
        assert!(fx.build_dir.exists());
    }

    #[tokio::test]
    async fn send_without_token_is_not_logged_in() {
        let fx = fixture();
        let catalog = loaded_catalog().await;
        let orch = UploadOrchestrator::new(transport());
        let prepared = orch.prepare(&create_request(&fx), &catalog).await.unwrap();
        let err = orch
            .send(prepared, &Session::new("http://127.0.0.1:1"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NotLoggedIn));
    }

    #[test]
    fn application_id_shapes() {
        assert_eq!(extract_application_id(r#"{"id":"a1"}"#).as_deref(), Some("a1"));
        assert_eq!(extract_application_id(r#"{"_id":"a1"}"#).as_deref(), Some("a1"));
        assert_eq!(
            extract_application_id(r#"{"application":{"_id":"a1"}}"#).as_deref(),
            Some("a1")
        );
        assert_eq!(
            extract_application_id(r#"{"success":true,"data":{"id":42}}"#).as_deref(),
            Some("42")
        );
        assert_eq!(extract_application_id(r#"{"ok":true}"#), None);
        assert_eq!(extract_application_id("created"), None);
    }
}
