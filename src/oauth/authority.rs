//! Token authority: credential caching, expiry validation and refresh
//! orchestration.
//!
//! The authority is the only component that mutates persisted credentials.
//! It owns an in-memory cache so a process performs at most one disk load
//! and one refresh per token lifetime, and it is instance-scoped state, so
//! independent authorities (e.g. in tests) never interfere.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::credentials::{parse_credentials, Credential, RefreshedToken};
use super::OAuthError;
use crate::config::OAuthConfig;
use crate::storage::CredentialStore;

/// Successful response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Owns the credential lifecycle: load, validate, refresh, persist.
///
/// State machine for a credential, from the authority's perspective:
/// `UNLOADED -> LOADED(valid) | LOADED(expired) -> REFRESHING ->
/// PERSISTED(valid)`. There is no teardown; state lives for the life of
/// the authority.
pub struct TokenAuthority {
    config: OAuthConfig,
    store: Arc<dyn CredentialStore>,
    http: reqwest::Client,
    cached: Mutex<Option<Credential>>,
}

impl TokenAuthority {
    /// Create a new TokenAuthority.
    pub fn new(config: OAuthConfig, store: Arc<dyn CredentialStore>, http: reqwest::Client) -> Self {
        Self {
            config,
            store,
            http,
            cached: Mutex::new(None),
        }
    }

    /// The fully expanded credentials file path.
    ///
    /// A leading `~` expands to the user's home directory; a path that
    /// starts with `~` on a system with no resolvable home is used as-is
    /// and will fail at the store with a path-shaped error message.
    pub fn credentials_path(&self) -> PathBuf {
        expand_home(&self.config.credentials_path)
    }

    /// Return a credential guaranteed valid at the moment of return.
    ///
    /// Checks the in-memory cache first, then the disk copy, and refreshes
    /// only when both are expired. A persistence failure after a successful
    /// refresh surfaces as [`OAuthError::FileRead`] even though the refresh
    /// itself succeeded; the cache keeps the merged credential, so the next
    /// call is served from memory and only process restarts lose it.
    #[instrument(skip(self))]
    pub async fn get_valid_token(&self) -> Result<Credential, OAuthError> {
        {
            let cache = self.cached.lock().await;
            if let Some(creds) = cache.as_ref() {
                if creds.is_valid() {
                    return Ok(creds.clone());
                }
                debug!("Cached token expired");
            }
        }

        let loaded = self.load_from_disk()?;

        if loaded.is_valid() {
            let mut cache = self.cached.lock().await;
            *cache = Some(loaded.clone());
            return Ok(loaded);
        }

        info!("Access token expired, refreshing");
        let refreshed = self.request_refresh(&loaded).await?;
        self.merge_and_persist(&loaded, refreshed).await
    }

    /// Force a refresh regardless of the disk copy's expiry.
    ///
    /// Used by the streaming layer when a live call reports an
    /// authentication failure despite a locally valid token (clock skew or
    /// serverside revocation). Loads from disk, refreshes, merges, persists
    /// and updates the cache.
    #[instrument(skip(self))]
    pub async fn refresh_token(&self) -> Result<Credential, OAuthError> {
        let loaded = self.load_from_disk()?;
        let refreshed = self.request_refresh(&loaded).await?;
        self.merge_and_persist(&loaded, refreshed).await
    }

    fn load_from_disk(&self) -> Result<Credential, OAuthError> {
        let path = self.credentials_path();
        if !self.store.exists(&path) {
            return Err(OAuthError::CredentialsNotFound { path });
        }
        let content = self.store.read(&path)?;
        parse_credentials(&content)
    }

    /// Perform the refresh-token grant against the token endpoint.
    async fn request_refresh(&self, creds: &Credential) -> Result<RefreshedToken, OAuthError> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", creds.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| OAuthError::RefreshFailed {
                status_code: 0,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response
                .text()
                .await
                .map_err(|e| OAuthError::RefreshFailed {
                    status_code: 0,
                    message: e.to_string(),
                })?;
            warn!(status = status.as_u16(), "Token refresh rejected");
            return Err(OAuthError::RefreshFailed {
                status_code: status.as_u16(),
                message: body,
            });
        }

        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| OAuthError::RefreshFailed {
                    status_code: 0,
                    message: e.to_string(),
                })?;

        debug!("Token refresh successful");
        Ok(RefreshedToken {
            access_token: token.access_token,
            expiry_date: chrono::Utc::now().timestamp_millis() + token.expires_in * 1000,
        })
    }

    /// Merge a refresh result, update the cache, then persist.
    ///
    /// The cache is updated before the write so a failed write still leaves
    /// the process holding a usable token.
    async fn merge_and_persist(
        &self,
        loaded: &Credential,
        refreshed: RefreshedToken,
    ) -> Result<Credential, OAuthError> {
        let merged = loaded.merge_refreshed(refreshed);

        {
            let mut cache = self.cached.lock().await;
            *cache = Some(merged.clone());
        }

        let path = self.credentials_path();
        let content = serde_json::to_string_pretty(&merged)
            .map_err(|e| OAuthError::file_read(&path, e.to_string()))?;
        self.store.write(&path, &content)?;

        Ok(merged)
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}
