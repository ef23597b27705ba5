//! Streaming generation against the Cloud Code API.
//!
//! - [`client`] - [`GeminiClient`], the streaming request orchestrator
//! - [`discovery`] - the one-time project-binding handshake
//! - [`sse`] - the SSE stream decoder
//! - [`models`] - request/response wire types and role mapping
//! - [`error`] - the generation error taxonomy
//! - [`constants`] - fixed endpoints and defaults

pub mod client;
pub mod constants;
pub mod discovery;
pub mod error;
pub mod models;
pub mod sse;

pub use client::{GeminiClient, GenerationOutcome};
pub use discovery::{ProjectInfo, ProjectResolver};
pub use error::{Error, Result};
pub use models::{Message, Role, StreamChunk, UsageMetadata};
pub use sse::{DroppedEvents, SseStream};
