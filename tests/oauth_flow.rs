//! Credential lifecycle integration tests: load, validate, refresh, persist.

use std::path::Path;
use std::sync::Arc;

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gemini_gate::config::OAuthConfig;
use gemini_gate::oauth::{Credential, OAuthError, TokenAuthority};
use gemini_gate::storage::{CredentialStore, FileCredentialStore, MemoryCredentialStore};

fn credential(expiry_offset_millis: i64) -> Credential {
    Credential {
        access_token: "ya29.old".into(),
        refresh_token: "1//refresh".into(),
        expiry_date: chrono::Utc::now().timestamp_millis() + expiry_offset_millis,
        scope: "https://www.googleapis.com/auth/cloud-platform".into(),
        token_type: "Bearer".into(),
    }
}

fn write_credential_file(dir: &tempfile::TempDir, creds: &Credential) -> std::path::PathBuf {
    let file = dir.path().join("oauth_creds.json");
    std::fs::write(&file, serde_json::to_string_pretty(creds).unwrap()).unwrap();
    file
}

fn authority(token_url: String, creds_path: &Path, store: Arc<dyn CredentialStore>) -> TokenAuthority {
    let config = OAuthConfig {
        client_id: "test-client".into(),
        client_secret: "test-secret".into(),
        token_url,
        credentials_path: creds_path.display().to_string(),
    };
    TokenAuthority::new(config, store, reqwest::Client::new())
}

fn refresh_ok_template() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": "ya29.fresh",
        "expires_in": 3600,
        "scope": "https://www.googleapis.com/auth/cloud-platform",
        "token_type": "Bearer"
    }))
}

#[tokio::test]
async fn valid_disk_credential_needs_no_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let creds = credential(3_600_000);
    let file = write_credential_file(&dir, &creds);

    // No token endpoint mounted: a refresh attempt would fail loudly.
    let authority = authority(
        "http://127.0.0.1:1/token".into(),
        &file,
        Arc::new(FileCredentialStore::new()),
    );

    let token = authority.get_valid_token().await.unwrap();
    assert_eq!(token.access_token, "ya29.old");
}

#[tokio::test]
async fn expired_credential_is_refreshed_and_persisted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=1%2F%2Frefresh"))
        .and(body_string_contains("client_id=test-client"))
        .and(body_string_contains("client_secret=test-secret"))
        .respond_with(refresh_ok_template())
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let creds = credential(-1_000);
    let file = write_credential_file(&dir, &creds);

    let authority = authority(
        format!("{}/token", server.uri()),
        &file,
        Arc::new(FileCredentialStore::new()),
    );

    let before = chrono::Utc::now().timestamp_millis();
    let token = authority.get_valid_token().await.unwrap();

    assert_eq!(token.access_token, "ya29.fresh");
    assert_eq!(token.refresh_token, "1//refresh");
    assert_eq!(token.scope, creds.scope);
    assert_eq!(token.token_type, "Bearer");
    assert!(token.expiry_date >= before + 3_600_000);

    // The file was rewritten wholesale, pretty-printed, with the merged record.
    let content = std::fs::read_to_string(&file).unwrap();
    assert!(content.contains("\n  \"access_token\""));
    let on_disk: Credential = serde_json::from_str(&content).unwrap();
    assert_eq!(on_disk, token);
}

#[tokio::test]
async fn missing_file_is_credentials_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("absent.json");
    let authority = authority(
        "http://127.0.0.1:1/token".into(),
        &file,
        Arc::new(FileCredentialStore::new()),
    );

    let err = authority.get_valid_token().await.unwrap_err();
    match err {
        OAuthError::CredentialsNotFound { path } => assert_eq!(path, file),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn refresh_rejection_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_credential_file(&dir, &credential(-1_000));
    let authority = authority(
        format!("{}/token", server.uri()),
        &file,
        Arc::new(FileCredentialStore::new()),
    );

    let err = authority.get_valid_token().await.unwrap_err();
    match err {
        OAuthError::RefreshFailed {
            status_code,
            message,
        } => {
            assert_eq!(status_code, 400);
            assert!(message.contains("invalid_grant"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn refresh_network_failure_is_status_zero() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_credential_file(&dir, &credential(-1_000));
    // Nothing listens on port 1; the connection is refused.
    let authority = authority(
        "http://127.0.0.1:1/token".into(),
        &file,
        Arc::new(FileCredentialStore::new()),
    );

    let err = authority.get_valid_token().await.unwrap_err();
    match err {
        OAuthError::RefreshFailed { status_code, .. } => assert_eq!(status_code, 0),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn forced_refresh_ignores_valid_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(refresh_ok_template())
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_credential_file(&dir, &credential(3_600_000));
    let authority = authority(
        format!("{}/token", server.uri()),
        &file,
        Arc::new(FileCredentialStore::new()),
    );

    // The disk copy is perfectly valid; refresh_token() must still hit the
    // token endpoint.
    let token = authority.refresh_token().await.unwrap();
    assert_eq!(token.access_token, "ya29.fresh");
    assert_eq!(token.refresh_token, "1//refresh");
}

/// Store whose writes always fail, for the persistence-failure policy.
#[derive(Clone)]
struct ReadOnlyStore(MemoryCredentialStore);

impl CredentialStore for ReadOnlyStore {
    fn exists(&self, path: &Path) -> bool {
        self.0.exists(path)
    }
    fn read(&self, path: &Path) -> Result<String, OAuthError> {
        self.0.read(path)
    }
    fn write(&self, path: &Path, _content: &str) -> Result<(), OAuthError> {
        Err(OAuthError::file_read(path, "read-only store"))
    }
    fn name(&self) -> &str {
        "read-only"
    }
}

#[tokio::test]
async fn persistence_failure_surfaces_but_cache_keeps_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(refresh_ok_template())
        .expect(1)
        .mount(&server)
        .await;

    let creds = credential(-1_000);
    let path = Path::new("/virtual/creds.json");
    let inner =
        MemoryCredentialStore::with_content(path, serde_json::to_string_pretty(&creds).unwrap());
    let authority = authority(
        format!("{}/token", server.uri()),
        path,
        Arc::new(ReadOnlyStore(inner)),
    );

    // The refresh succeeds but the write fails.
    let err = authority.get_valid_token().await.unwrap_err();
    assert!(matches!(err, OAuthError::FileRead { .. }));

    // The merged credential is in the cache, so the next call succeeds
    // without touching the token endpoint again.
    let token = authority.get_valid_token().await.unwrap();
    assert_eq!(token.access_token, "ya29.fresh");
}

#[tokio::test]
async fn cache_survives_disk_changes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(refresh_ok_template())
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_credential_file(&dir, &credential(-1_000));
    let authority = authority(
        format!("{}/token", server.uri()),
        &file,
        Arc::new(FileCredentialStore::new()),
    );

    let first = authority.get_valid_token().await.unwrap();
    std::fs::remove_file(&file).unwrap();
    let second = authority.get_valid_token().await.unwrap();
    assert_eq!(first, second);
}
