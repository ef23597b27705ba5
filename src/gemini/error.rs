//! Error types for the generation layer.

use crate::oauth::OAuthError;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when calling the Cloud Code API.
///
/// The stream yields this single type; credential failures arrive through
/// the transparent [`Error::OAuth`] wrapper unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The API rejected the request with a 429.
    #[error("Rate limited - retry after {retry_after}s")]
    RateLimit {
        /// Seconds to wait, from the `retry-after` header (60 when absent
        /// or malformed).
        retry_after: u64,
    },

    /// Non-success API response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        message: String,
    },

    /// Transport-level failure.
    #[error("Network error: {message}")]
    Network {
        /// Underlying error message.
        message: String,
    },

    /// A response payload could not be parsed.
    #[error("Parse error: {message}")]
    Parse {
        /// What failed to parse.
        message: String,
    },

    /// The project-binding handshake failed.
    #[error("Failed to discover project: {message}")]
    ProjectDiscovery {
        /// Endpoint status and body, or transport error.
        message: String,
    },

    /// The caller's input was rejected before any request was made.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Which constraint was violated.
        message: String,
    },

    /// Credential lifecycle failure, passed through unchanged.
    #[error(transparent)]
    OAuth(#[from] OAuthError),
}

impl Error {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Error::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
        }
    }

    /// Create a project discovery error.
    pub fn project_discovery(message: impl Into<String>) -> Self {
        Error::ProjectDiscovery {
            message: message.into(),
        }
    }

    /// Create an invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Error::InvalidRequest {
            message: message.into(),
        }
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::RateLimit { .. })
    }

    /// Check if this is an authentication failure (HTTP 401).
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Api { status: 401, .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network {
            message: e.to_string(),
        }
    }
}
