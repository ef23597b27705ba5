//! OAuth credential lifecycle for the Cloud Code API.
//!
//! Single provider, single grant type: the refresh-token grant against
//! Google's token endpoint, using the credential record the Gemini CLI
//! writes to disk.
//!
//! - [`credentials`] - the on-disk [`Credential`] record, parsing and expiry
//!   validation
//! - [`authority`] - [`TokenAuthority`], the one component allowed to mutate
//!   persisted credentials

pub mod authority;
pub mod credentials;

pub use authority::TokenAuthority;
pub use credentials::{Credential, RefreshedToken};

use std::path::PathBuf;

/// Errors that can occur during credential handling.
///
/// Always returned, never panicked; the generation layer wraps these
/// transparently so a stream carries both taxonomies in one error type.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// No credentials file exists at the configured path.
    #[error("Credentials not found at '{}'", path.display())]
    CredentialsNotFound {
        /// The fully expanded path that was checked.
        path: PathBuf,
    },

    /// The credentials file exists but its content is unusable.
    #[error("Invalid credentials: {reason}")]
    InvalidCredentials {
        /// Why parsing rejected the content.
        reason: String,
    },

    /// The access token's expiry has passed.
    #[error("Token expired at {expiry}")]
    TokenExpired {
        /// Expiry timestamp of the rejected credential (epoch millis).
        expiry: i64,
    },

    /// The refresh-token grant failed.
    #[error("Token refresh failed ({status_code}): {message}")]
    RefreshFailed {
        /// HTTP status of the token endpoint response, or 0 for a
        /// network-level failure.
        status_code: u16,
        /// Response body, or the transport error message.
        message: String,
    },

    /// Reading or writing the credentials file failed.
    #[error("File error at '{}': {message}", path.display())]
    FileRead {
        /// Path of the file that could not be accessed.
        path: PathBuf,
        /// Underlying I/O error message.
        message: String,
    },
}

impl OAuthError {
    /// Create an [`OAuthError::InvalidCredentials`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        OAuthError::InvalidCredentials {
            reason: reason.into(),
        }
    }

    /// Create an [`OAuthError::FileRead`].
    pub fn file_read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        OAuthError::FileRead {
            path: path.into(),
            message: message.into(),
        }
    }
}
