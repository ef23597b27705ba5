//! Project discovery for the Cloud Code API.
//!
//! Every generation call must carry a Cloud Code project id. This module
//! resolves one through a one-time handshake:
//!
//! 1. Call `loadCodeAssist` with a placeholder project id and fixed client
//!    metadata
//! 2. If the response already names a bound project, use it
//! 3. Otherwise call `onboardUser` with the default tier from the response's
//!    tier list (or a fixed fallback tier)
//! 4. If onboarding reports completion, use the project id it returns
//!
//! Onboarding is checked once, not polled: when the upstream operation has
//! not finished, the resolver falls back to the placeholder project id
//! rather than waiting.
//!
//! The first successful result is memoized for the resolver's lifetime.
//! Failures are not cached and are retried on the next call; concurrent
//! callers coalesce into a single in-flight handshake.

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use super::constants::{FALLBACK_TIER_ID, PLACEHOLDER_PROJECT_ID};
use super::error::{Error, Result};

/// Fixed client metadata sent with both handshake calls.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientMetadata {
    ide_type: &'static str,
    platform: &'static str,
    plugin_type: &'static str,
    duet_project: &'static str,
}

const CLIENT_METADATA: ClientMetadata = ClientMetadata {
    ide_type: "IDE_UNSPECIFIED",
    platform: "PLATFORM_UNSPECIFIED",
    plugin_type: "GEMINI",
    duet_project: PLACEHOLDER_PROJECT_ID,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadRequest {
    cloudaicompanion_project: &'static str,
    metadata: ClientMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadResponse {
    /// Project already bound to this account, if any.
    #[serde(default)]
    cloudaicompanion_project: Option<String>,
    /// Tiers the account may onboard onto.
    #[serde(default)]
    allowed_tiers: Vec<Tier>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tier {
    id: String,
    #[serde(default)]
    is_default: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OnboardRequest {
    tier_id: String,
    cloudaicompanion_project: &'static str,
    metadata: ClientMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OnboardResponse {
    /// Whether the long-running onboard operation has finished.
    #[serde(default)]
    done: bool,
    #[serde(default)]
    response: Option<OnboardPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OnboardPayload {
    #[serde(default)]
    cloudaicompanion_project: Option<ProjectRef>,
}

#[derive(Debug, Deserialize)]
struct ProjectRef {
    #[serde(default)]
    id: Option<String>,
}

/// A resolved Cloud Code project binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// The project id every generation call must carry.
    pub project_id: String,
    /// Human-readable name; the API exposes none, so this mirrors the id.
    pub display_name: String,
}

impl ProjectInfo {
    fn from_id(project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        Self {
            display_name: project_id.clone(),
            project_id,
        }
    }
}

/// Resolves and memoizes the Cloud Code project id.
pub struct ProjectResolver {
    endpoint: String,
    http: reqwest::Client,
    cell: OnceCell<ProjectInfo>,
}

impl ProjectResolver {
    /// Create a resolver against `endpoint` (the API prefix, e.g.
    /// `https://cloudcode-pa.googleapis.com/v1internal`).
    pub fn new(endpoint: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            http,
            cell: OnceCell::new(),
        }
    }

    /// The memoized project, if discovery has already succeeded.
    pub fn cached(&self) -> Option<&ProjectInfo> {
        self.cell.get()
    }

    /// Resolve the project id, running the handshake on first use.
    #[instrument(skip(self, access_token))]
    pub async fn discover(&self, access_token: &str) -> Result<ProjectInfo> {
        let info = self
            .cell
            .get_or_try_init(|| self.run_handshake(access_token))
            .await?;
        Ok(info.clone())
    }

    async fn run_handshake(&self, access_token: &str) -> Result<ProjectInfo> {
        let load_url = format!("{}:loadCodeAssist", self.endpoint);
        debug!(url = %load_url, "Loading code assist state");

        let response = self
            .http
            .post(&load_url)
            .bearer_auth(access_token)
            .json(&LoadRequest {
                cloudaicompanion_project: PLACEHOLDER_PROJECT_ID,
                metadata: CLIENT_METADATA,
            })
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await?;
            return Err(Error::project_discovery(format!(
                "Failed to load projects: {} - {}",
                status.as_u16(),
                body
            )));
        }

        let load: LoadResponse = response
            .json()
            .await
            .map_err(|e| Error::project_discovery(format!("Malformed load response: {e}")))?;

        if let Some(project_id) = load.cloudaicompanion_project {
            info!(project_id = %project_id, "Project already bound");
            return Ok(ProjectInfo::from_id(project_id));
        }

        // No bound project; onboard onto the default tier.
        let tier_id = load
            .allowed_tiers
            .iter()
            .find(|t| t.is_default)
            .map(|t| t.id.clone())
            .unwrap_or_else(|| FALLBACK_TIER_ID.to_string());

        let onboard_url = format!("{}:onboardUser", self.endpoint);
        debug!(url = %onboard_url, tier = %tier_id, "Onboarding user");

        let response = self
            .http
            .post(&onboard_url)
            .bearer_auth(access_token)
            .json(&OnboardRequest {
                tier_id,
                cloudaicompanion_project: PLACEHOLDER_PROJECT_ID,
                metadata: CLIENT_METADATA,
            })
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await?;
            return Err(Error::project_discovery(format!(
                "Onboarding failed: {} - {}",
                status.as_u16(),
                body
            )));
        }

        let onboard: OnboardResponse = response
            .json()
            .await
            .map_err(|e| Error::project_discovery(format!("Malformed onboard response: {e}")))?;

        if onboard.done {
            let project_id = onboard
                .response
                .and_then(|p| p.cloudaicompanion_project)
                .and_then(|p| p.id)
                .unwrap_or_else(|| PLACEHOLDER_PROJECT_ID.to_string());
            info!(project_id = %project_id, "User onboarded");
            return Ok(ProjectInfo::from_id(project_id));
        }

        // Single-shot check: the operation is still running upstream, so
        // fall back to the placeholder rather than polling to completion.
        warn!("Onboarding not complete, using placeholder project id");
        Ok(ProjectInfo::from_id(PLACEHOLDER_PROJECT_ID))
    }
}
