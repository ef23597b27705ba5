//! Configuration for the Cloud Code client.
//!
//! Every field has a working default, so `Config::default()` is a usable
//! configuration for a machine where the Gemini CLI has already
//! authenticated. A TOML file can override any subset, and a handful of
//! environment variables override the file (useful for tests and
//! deployments that relocate the credentials file or point at a mock
//! endpoint).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::gemini::constants::{
    CLOUDCODE_ENDPOINT, DEFAULT_CREDENTIALS_PATH, DEFAULT_MODEL, OAUTH_CLIENT_ID,
    OAUTH_CLIENT_SECRET, OAUTH_TOKEN_URL,
};

/// Errors from loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file '{path}': {message}")]
    Read {
        /// Path that was passed to [`Config::load`].
        path: String,
        /// Underlying I/O error message.
        message: String,
    },

    /// The file is not valid TOML for this schema.
    #[error("Failed to parse config file '{path}': {message}")]
    Parse {
        /// Path that was passed to [`Config::load`].
        path: String,
        /// TOML deserializer error message.
        message: String,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// OAuth application and credential file settings.
    #[serde(default)]
    pub oauth: OAuthConfig,
    /// Cloud Code API settings.
    #[serde(default)]
    pub gemini: GeminiConfig,
}

/// OAuth settings: the fixed application registration plus the location of
/// the credentials file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OAuthConfig {
    /// OAuth client id.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// OAuth client secret.
    #[serde(default = "default_client_secret")]
    pub client_secret: String,
    /// Token endpoint for the refresh-token grant.
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Credentials file path; a leading `~` expands to the home directory.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            client_secret: default_client_secret(),
            token_url: default_token_url(),
            credentials_path: default_credentials_path(),
        }
    }
}

/// Cloud Code API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeminiConfig {
    /// API endpoint including the version prefix; operation names are
    /// appended with a colon.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model used when the caller does not name one.
    #[serde(default = "default_model")]
    pub default_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            default_model: default_model(),
        }
    }
}

fn default_client_id() -> String {
    OAUTH_CLIENT_ID.to_string()
}

fn default_client_secret() -> String {
    OAUTH_CLIENT_SECRET.to_string()
}

fn default_token_url() -> String {
    OAUTH_TOKEN_URL.to_string()
}

fn default_credentials_path() -> String {
    DEFAULT_CREDENTIALS_PATH.to_string()
}

fn default_endpoint() -> String {
    CLOUDCODE_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Config {
    /// Load configuration from a TOML file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Build the default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Apply `GEMINI_GATE_*` environment variable overrides in place.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("GEMINI_GATE_CREDENTIALS_PATH") {
            self.oauth.credentials_path = v;
        }
        if let Ok(v) = std::env::var("GEMINI_GATE_TOKEN_URL") {
            self.oauth.token_url = v;
        }
        if let Ok(v) = std::env::var("GEMINI_GATE_ENDPOINT") {
            self.gemini.endpoint = v;
        }
        if let Ok(v) = std::env::var("GEMINI_GATE_DEFAULT_MODEL") {
            self.gemini.default_model = v;
        }
    }
}
