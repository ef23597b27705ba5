//! Request and response types for the Cloud Code generation API.
//!
//! The caller-facing [`Message`] uses the familiar `user`/`assistant` roles;
//! the wire format speaks `user`/`model`. Conversion between the two is the
//! only mapping in the crate and is total: N messages always produce N
//! contents in the same order.

use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_TEMPERATURE};
use super::error::Error;

// ============================================================================
// Caller-facing types
// ============================================================================

/// Role of a caller-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End-user input.
    User,
    /// Prior model output, replayed for context.
    Assistant,
}

/// One turn of a conversation, as callers supply it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the turn.
    pub role: Role,
    /// Text of the turn.
    pub content: String,
}

impl Message {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Wire request types
// ============================================================================

/// Role as the wire format spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    /// Maps from caller role `user`.
    User,
    /// Maps from caller role `assistant`.
    Model,
}

/// One text part of a content entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// The text payload.
    pub text: String,
}

/// One entry of the wire `contents` sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Wire role.
    pub role: WireRole,
    /// Ordered text parts.
    pub parts: Vec<Part>,
}

impl From<&Message> for Content {
    fn from(message: &Message) -> Self {
        Content {
            role: match message.role {
                Role::User => WireRole::User,
                Role::Assistant => WireRole::Model,
            },
            parts: vec![Part {
                text: message.content.clone(),
            }],
        }
    }
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature.
    pub temperature: f64,
    /// Output token limit.
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

/// A complete generation request before project binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Model id.
    pub model: String,
    /// Conversation in wire form.
    pub contents: Vec<Content>,
    /// Sampling parameters.
    pub generation_config: GenerationConfig,
}

impl GenerationRequest {
    /// Build a request from caller-facing messages, applying the default
    /// temperature (0.7) and output limit (8192) where unset.
    pub fn new(
        model: impl Into<String>,
        messages: &[Message],
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> Self {
        Self {
            model: model.into(),
            contents: messages.iter().map(Content::from).collect(),
            generation_config: GenerationConfig {
                temperature: temperature.unwrap_or(DEFAULT_TEMPERATURE),
                max_output_tokens: max_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
            },
        }
    }
}

/// The outer envelope `streamGenerateContent` expects: model and project at
/// the top, the request proper nested under `request`.
#[derive(Debug, Clone, Serialize)]
pub struct StreamRequest {
    /// Model id.
    pub model: String,
    /// Bound Cloud Code project id.
    pub project: String,
    /// The nested request.
    pub request: InnerRequest,
}

/// Nested request body of a [`StreamRequest`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerRequest {
    /// Conversation in wire form.
    pub contents: Vec<Content>,
    /// Sampling parameters.
    pub generation_config: GenerationConfig,
}

impl StreamRequest {
    /// Wrap a [`GenerationRequest`] with a project binding.
    pub fn wrap(request: GenerationRequest, project_id: impl Into<String>) -> Self {
        Self {
            model: request.model,
            project: project_id.into(),
            request: InnerRequest {
                contents: request.contents,
                generation_config: request.generation_config,
            },
        }
    }
}

// ============================================================================
// Stream response types
// ============================================================================

/// Cumulative token counts reported by the stream.
///
/// When several chunks carry usage, the last-seen value is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_token_count: u32,
    /// Tokens generated so far.
    #[serde(default)]
    pub candidates_token_count: u32,
    /// Prompt plus generated.
    #[serde(default)]
    pub total_token_count: u32,
}

/// One incremental fragment of a streamed response.
///
/// Chunks are additive: a full response is the concatenation of `text`
/// fields in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunk {
    /// Text delta, if this chunk carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Finish reason, present on the final content chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    /// Cumulative usage, when the envelope carries it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

/// Raw SSE event payload envelope.
///
/// Cloud Code wraps the generation response in an optional top-level
/// `response` object; both shapes occur in the wild.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamEnvelope {
    #[serde(default)]
    response: Option<Box<StreamEnvelope>>,
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl StreamChunk {
    /// Parse one SSE `data` payload into a chunk.
    ///
    /// Unwraps the optional `response` envelope, reads the first candidate's
    /// first part text and finish reason, and the usage block with counts
    /// defaulting to zero.
    pub fn from_json(data: &str) -> Result<StreamChunk, Error> {
        let envelope: StreamEnvelope = serde_json::from_str(data)
            .map_err(|e| Error::parse(format!("Failed to parse stream chunk: {e}")))?;

        let inner: &StreamEnvelope = match &envelope.response {
            Some(boxed) => boxed,
            None => &envelope,
        };

        let candidate = inner.candidates.as_ref().and_then(|c| c.first());

        let text = candidate
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.clone())
            .filter(|t| !t.is_empty());

        let finish_reason = candidate.and_then(|c| c.finish_reason.clone());

        Ok(StreamChunk {
            text,
            finish_reason,
            usage_metadata: inner.usage_metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_mapping_worked_example() {
        let messages = vec![Message::user("Hello"), Message::assistant("Hi")];
        let request = GenerationRequest::new("gemini-1.5-pro", &messages, None, None);

        assert_eq!(request.model, "gemini-1.5-pro");
        assert_eq!(request.contents.len(), 2);
        assert_eq!(request.contents[0].role, WireRole::User);
        assert_eq!(request.contents[0].parts, vec![Part { text: "Hello".into() }]);
        assert_eq!(request.contents[1].role, WireRole::Model);
        assert_eq!(request.contents[1].parts, vec![Part { text: "Hi".into() }]);
        assert_eq!(request.generation_config.temperature, 0.7);
        assert_eq!(request.generation_config.max_output_tokens, 8192);
    }

    #[test]
    fn test_role_mapping_preserves_order_and_length() {
        let messages: Vec<Message> = (0..7)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("u{i}"))
                } else {
                    Message::assistant(format!("a{i}"))
                }
            })
            .collect();

        let request = GenerationRequest::new("m", &messages, None, None);
        assert_eq!(request.contents.len(), messages.len());
        for (content, message) in request.contents.iter().zip(&messages) {
            assert_eq!(content.parts[0].text, message.content);
            let expected = match message.role {
                Role::User => WireRole::User,
                Role::Assistant => WireRole::Model,
            };
            assert_eq!(content.role, expected);
        }
    }

    #[test]
    fn test_explicit_params_override_defaults() {
        let request =
            GenerationRequest::new("m", &[Message::user("x")], Some(1.5), Some(256));
        assert_eq!(request.generation_config.temperature, 1.5);
        assert_eq!(request.generation_config.max_output_tokens, 256);
    }

    #[test]
    fn test_wire_serialization_shape() {
        let request = GenerationRequest::new("gemini-2.5-pro", &[Message::user("Hi")], None, None);
        let wire = StreamRequest::wrap(request, "proj-1");
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json["model"], "gemini-2.5-pro");
        assert_eq!(json["project"], "proj-1");
        assert_eq!(json["request"]["contents"][0]["role"], "user");
        assert_eq!(json["request"]["contents"][0]["parts"][0]["text"], "Hi");
        assert_eq!(json["request"]["generationConfig"]["temperature"], 0.7);
        assert_eq!(json["request"]["generationConfig"]["maxOutputTokens"], 8192);
    }

    #[test]
    fn test_chunk_from_plain_envelope() {
        let chunk = StreamChunk::from_json(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.text.as_deref(), Some("Hello"));
        assert!(chunk.finish_reason.is_none());
        assert!(chunk.usage_metadata.is_none());
    }

    #[test]
    fn test_chunk_unwraps_response_envelope() {
        let chunk = StreamChunk::from_json(
            r#"{"response":{"candidates":[{"content":{"parts":[{"text":"wrapped"}]},"finishReason":"STOP"}]}}"#,
        )
        .unwrap();
        assert_eq!(chunk.text.as_deref(), Some("wrapped"));
        assert_eq!(chunk.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_chunk_usage_defaults_to_zero() {
        let chunk = StreamChunk::from_json(r#"{"usageMetadata":{"promptTokenCount":12}}"#).unwrap();
        let usage = chunk.usage_metadata.unwrap();
        assert_eq!(usage.prompt_token_count, 12);
        assert_eq!(usage.candidates_token_count, 0);
        assert_eq!(usage.total_token_count, 0);
    }

    #[test]
    fn test_chunk_empty_text_is_absent() {
        let chunk =
            StreamChunk::from_json(r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#)
                .unwrap();
        assert!(chunk.text.is_none());
    }

    #[test]
    fn test_chunk_malformed_json_is_parse_error() {
        let err = StreamChunk::from_json("{nope").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_chunk_no_candidates_is_empty_chunk() {
        let chunk = StreamChunk::from_json("{}").unwrap();
        assert!(chunk.text.is_none());
        assert!(chunk.finish_reason.is_none());
        assert!(chunk.usage_metadata.is_none());
    }
}
