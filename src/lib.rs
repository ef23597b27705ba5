//! OAuth-authenticated streaming client for the Gemini Cloud Code API.
//!
//! This crate drives Google's Cloud Code (`cloudcode-pa`) generation endpoint
//! using credentials produced by the Gemini CLI's OAuth flow. It covers three
//! tightly coupled concerns:
//!
//! - **Credential lifecycle** - loading the on-disk OAuth record, validating
//!   expiry, refreshing lazily via the refresh-token grant, and persisting the
//!   merged result ([`oauth::TokenAuthority`]).
//! - **Project binding** - the one-time `loadCodeAssist` / `onboardUser`
//!   handshake that resolves the Cloud Code project id every generation call
//!   must carry ([`gemini::discovery::ProjectResolver`]).
//! - **Streaming generation** - issuing `streamGenerateContent` requests,
//!   decoding the SSE response incrementally, and transparently retrying
//!   exactly once when a stale token produces a 401 mid-call
//!   ([`gemini::GeminiClient`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gemini_gate::{Config, FileCredentialStore, GeminiClient, Message};
//!
//! let config = Config::default();
//! let client = GeminiClient::new(&config, Arc::new(FileCredentialStore::new()));
//!
//! let outcome = client
//!     .generate(None, vec![Message::user("Hello")], None, None)
//!     .await?;
//! println!("{}", outcome.text);
//! ```

pub mod config;
pub mod gemini;
pub mod oauth;
pub mod storage;

pub use config::Config;
pub use gemini::client::{GeminiClient, GenerationOutcome};
pub use gemini::error::Error;
pub use gemini::models::{Message, Role, StreamChunk, UsageMetadata};
pub use oauth::authority::TokenAuthority;
pub use oauth::credentials::Credential;
pub use oauth::OAuthError;
pub use storage::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
