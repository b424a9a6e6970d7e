//! Full client flow against a local mock platform.

use std::fs;

use platup_archive::{ArchiveMode, ArchiveOptions, archive_file_name};
use platup_session::MemoryCredentialStore;
use platup_transport::TransportConfig;
use platup_transport::mock::{MockResponse, MockServer};
use platup_upload::{Platform, UploadEvent, UploadMode, UploadPhase, UploadRequest};

#[tokio::test]
async fn login_archive_and_create_application() {
    let server = MockServer::start(vec![
        MockResponse::ok(r#"{"token":"t1","user":{"id":"u1","username":"alice"}}"#),
        MockResponse::ok(r#"[{"_id":"o1","name":"Acme"}]"#),
        MockResponse::ok(r#"{"id":"a1","name":"App"}"#),
    ])
    .await;

    let tmp = tempfile::tempdir().unwrap();
    let build_dir = tmp.path().join("Builds").join("WebGL");
    fs::create_dir_all(build_dir.join("Build")).unwrap();
    fs::write(build_dir.join("index.html"), "<html></html>").unwrap();
    fs::write(build_dir.join("Build").join("App.wasm"), vec![0u8; 8192]).unwrap();
    let archive = tmp.path().join("Builds").join("App.zip");

    let mut platform = Platform::new(
        TransportConfig::default(),
        Box::new(MemoryCredentialStore::new()),
        server.url(),
    )
    .unwrap();
    let mut events = platform.uploader().take_events().unwrap();

    let session = platform.login(server.url(), "alice", "pw").await.unwrap();
    assert_eq!(session.auth_token, "t1");
    assert_eq!(session.username, "alice");

    let org = platform.catalog().selected_organization().unwrap();
    assert_eq!((org.id.as_str(), org.name.as_str()), ("o1", "Acme"));

    let artifact = platform
        .build_archive(
            build_dir.clone(),
            archive.clone(),
            ArchiveOptions::default(),
            |_| {},
        )
        .await
        .unwrap();
    assert_eq!(artifact.file_count, 2);
    assert!(archive.exists());

    let request = UploadRequest {
        name: "App".into(),
        description: String::new(),
        organization_id: "o1".into(),
        is_public: false,
        archive_path: archive.clone(),
        build_dir: Some(build_dir.clone()),
        mode: UploadMode::Create,
    };
    let outcome = platform.upload(&request).await.unwrap();

    assert_eq!(outcome.status, 200);
    assert_eq!(outcome.application_id.as_deref(), Some("a1"));
    assert!(outcome.cleaned_up);
    assert!(!archive.exists());
    assert!(!build_dir.exists());

    let requests = server.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].path, "/api/auth/login");
    assert_eq!(requests[1].path, "/api/organizations");
    assert_eq!(requests[1].header("authorization"), Some("Bearer t1"));
    assert_eq!(requests[2].path, "/api/applications");
    assert_eq!(requests[2].header("authorization"), Some("Bearer t1"));
    let body = requests[2].body_text();
    assert!(body.contains("name=\"organizationId\"\r\n\r\no1\r\n"));
    assert!(body.contains("name=\"isPublic\"\r\n\r\nfalse\r\n"));
    assert!(body.contains(r#"filename="App.zip""#));

    let mut phases = Vec::new();
    while let Ok(ev) = events.try_recv() {
        if let UploadEvent::Phase(p) = ev {
            phases.push(p);
        }
    }
    assert_eq!(phases.first(), Some(&UploadPhase::Preparing));
    assert_eq!(phases.last(), Some(&UploadPhase::Completed));
}

#[tokio::test]
async fn expired_session_on_upload_logs_out() {
    let server = MockServer::start(vec![
        MockResponse::ok(r#"{"token":"t1","user":{"username":"alice"}}"#),
        MockResponse::ok(r#"{"items":[{"_id":"o1","name":"Acme"}]}"#),
        MockResponse::json(401, r#"{"error":"token expired"}"#),
    ])
    .await;

    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join(archive_file_name("My App", "WebGL", ArchiveMode::Create));
    fs::write(&archive, vec![1u8; 1024]).unwrap();

    let mut platform = Platform::new(
        TransportConfig::default(),
        Box::new(MemoryCredentialStore::new()),
        server.url(),
    )
    .unwrap();
    platform.login(server.url(), "alice", "pw").await.unwrap();

    let request = UploadRequest {
        name: "My App".into(),
        description: "desc".into(),
        organization_id: "o1".into(),
        is_public: true,
        archive_path: archive.clone(),
        build_dir: None,
        mode: UploadMode::Create,
    };
    let err = platform.upload(&request).await.unwrap_err();

    assert!(err.is_auth());
    assert!(!platform.session().logged_in);
    assert!(platform.catalog().organizations().is_empty());
    assert!(archive.exists());
    assert!(archive.ends_with("My_App_WebGL.zip"));
}
