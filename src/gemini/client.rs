//! Streaming request orchestrator.
//!
//! [`GeminiClient`] ties the pieces together: it asks the
//! [`TokenAuthority`] for a valid token, the [`ProjectResolver`] for a
//! project id (discovered once per client), issues the streaming call and
//! feeds the response body through the SSE decoder.
//!
//! The stream is driven by a spawned task feeding a bounded channel - an
//! explicit two-attempt state machine rather than implicit control-flow
//! suspension. A 401 on the first attempt is absorbed: the authority
//! force-refreshes and the whole call restarts exactly once. A 401 on the
//! second attempt surfaces as a terminal 401 API error so retry exhaustion
//! is observable, not a silent end of stream. The bounded
//! channel provides the backpressure: a full channel suspends the driver
//! until the consumer catches up, and a dropped receiver ends the driver at
//! its next send, releasing the response body.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument};

use super::constants::{DEFAULT_RETRY_AFTER_SECS, STREAM_CHANNEL_CAPACITY};
use super::discovery::ProjectResolver;
use super::error::{Error, Result};
use super::models::{GenerationRequest, Message, StreamChunk, StreamRequest, UsageMetadata};
use super::sse::SseStream;
use crate::config::Config;
use crate::oauth::TokenAuthority;
use crate::storage::CredentialStore;

/// Aggregated result of a complete generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    /// All text fragments concatenated in arrival order.
    pub text: String,
    /// Finish reason from the final content chunk, if reported.
    pub finish_reason: Option<String>,
    /// Last-seen cumulative usage, if reported.
    pub usage_metadata: Option<UsageMetadata>,
}

/// Outcome of one streaming attempt.
enum Attempt {
    /// Stream ran to completion; all chunks forwarded.
    Completed,
    /// A terminal error was sent (or the receiver went away); stop.
    Terminated,
    /// The API answered 401; the caller decides whether to retry.
    AuthFailed,
}

/// Client for streaming generation against the Cloud Code API.
pub struct GeminiClient {
    authority: Arc<TokenAuthority>,
    resolver: Arc<ProjectResolver>,
    http: reqwest::Client,
    endpoint: String,
    default_model: String,
}

impl GeminiClient {
    /// Create a client from a configuration and a credential store.
    ///
    /// One HTTP connection pool is shared by the token authority, the
    /// project resolver and the generation calls.
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>) -> Self {
        let http = reqwest::Client::new();
        let authority = Arc::new(TokenAuthority::new(
            config.oauth.clone(),
            store,
            http.clone(),
        ));
        let resolver = Arc::new(ProjectResolver::new(
            config.gemini.endpoint.clone(),
            http.clone(),
        ));
        Self {
            authority,
            resolver,
            http,
            endpoint: config.gemini.endpoint.clone(),
            default_model: config.gemini.default_model.clone(),
        }
    }

    /// The token authority backing this client.
    pub fn authority(&self) -> Arc<TokenAuthority> {
        self.authority.clone()
    }

    /// Stream a generation call.
    ///
    /// Yields decoded chunks as they arrive; the first terminal error ends
    /// the sequence. `model` defaults to the configured model, `temperature`
    /// to 0.7 and `max_tokens` to 8192.
    #[instrument(skip(self, messages))]
    pub fn generate_stream(
        &self,
        model: Option<&str>,
        messages: Vec<Message>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> ReceiverStream<Result<StreamChunk>> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        let driver = StreamDriver {
            authority: self.authority.clone(),
            resolver: self.resolver.clone(),
            http: self.http.clone(),
            endpoint: self.endpoint.clone(),
            model: model.unwrap_or(&self.default_model).to_string(),
            messages,
            temperature,
            max_tokens,
        };

        tokio::spawn(driver.run(tx));

        ReceiverStream::new(rx)
    }

    /// Run a generation call to completion and aggregate the stream.
    ///
    /// Concatenates text fragments in arrival order; the last-seen usage
    /// and finish reason win. The first error ends the call and is
    /// returned as-is.
    pub async fn generate(
        &self,
        model: Option<&str>,
        messages: Vec<Message>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> Result<GenerationOutcome> {
        let mut stream = self.generate_stream(model, messages, temperature, max_tokens);

        let mut text = String::new();
        let mut finish_reason = None;
        let mut usage_metadata = None;

        while let Some(item) = stream.next().await {
            let chunk = item?;
            if let Some(t) = chunk.text {
                text.push_str(&t);
            }
            if chunk.finish_reason.is_some() {
                finish_reason = chunk.finish_reason;
            }
            if chunk.usage_metadata.is_some() {
                usage_metadata = chunk.usage_metadata;
            }
        }

        Ok(GenerationOutcome {
            text,
            finish_reason,
            usage_metadata,
        })
    }
}

/// Owned state for one spawned stream drive.
struct StreamDriver {
    authority: Arc<TokenAuthority>,
    resolver: Arc<ProjectResolver>,
    http: reqwest::Client,
    endpoint: String,
    model: String,
    messages: Vec<Message>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
}

impl StreamDriver {
    async fn run(self, tx: mpsc::Sender<Result<StreamChunk>>) {
        if let Err(e) = validate_input(&self.messages, self.temperature, self.max_tokens) {
            let _ = tx.send(Err(e)).await;
            return;
        }

        let credential = match self.authority.get_valid_token().await {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(Err(e.into())).await;
                return;
            }
        };
        let mut access_token = credential.access_token;

        let project = match self.resolver.discover(&access_token).await {
            Ok(p) => p.project_id,
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        let request = GenerationRequest::new(
            self.model.clone(),
            &self.messages,
            self.temperature,
            self.max_tokens,
        );
        let wire = StreamRequest::wrap(request, project);

        // Two attempts total: the initial call plus one restart after a
        // forced refresh.
        for attempt in 0..2u8 {
            match self.run_attempt(&access_token, &wire, &tx).await {
                Attempt::Completed | Attempt::Terminated => return,
                Attempt::AuthFailed => {
                    if attempt == 0 {
                        info!("Stream rejected with 401, forcing token refresh");
                        match self.authority.refresh_token().await {
                            Ok(credential) => access_token = credential.access_token,
                            Err(e) => {
                                let _ = tx.send(Err(e.into())).await;
                                return;
                            }
                        }
                    } else {
                        let _ = tx
                            .send(Err(Error::api(401, "Authentication failed after token refresh")))
                            .await;
                        return;
                    }
                }
            }
        }
    }

    async fn run_attempt(
        &self,
        access_token: &str,
        wire: &StreamRequest,
        tx: &mpsc::Sender<Result<StreamChunk>>,
    ) -> Attempt {
        let url = format!("{}:streamGenerateContent?alt=sse", self.endpoint);

        let response = match self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(wire)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                let _ = tx.send(Err(e.into())).await;
                return Attempt::Terminated;
            }
        };

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            debug!("Stream request unauthorized");
            return Attempt::AuthFailed;
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers());
            let _ = tx.send(Err(Error::RateLimit { retry_after })).await;
            return Attempt::Terminated;
        }

        if status != reqwest::StatusCode::OK {
            let body = match response.text().await {
                Ok(b) => b,
                Err(e) => {
                    let _ = tx.send(Err(e.into())).await;
                    return Attempt::Terminated;
                }
            };
            let _ = tx.send(Err(Error::api(status.as_u16(), body))).await;
            return Attempt::Terminated;
        }

        let mut stream = SseStream::new(response.bytes_stream());
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    if tx.send(Ok(chunk)).await.is_err() {
                        // Receiver gone; dropping the stream releases the body.
                        return Attempt::Terminated;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return Attempt::Terminated;
                }
            }
        }

        Attempt::Completed
    }
}

/// Reject caller input the API would only fail on later.
fn validate_input(
    messages: &[Message],
    temperature: Option<f64>,
    max_tokens: Option<u32>,
) -> Result<()> {
    if messages.is_empty() {
        return Err(Error::invalid_request("messages must not be empty"));
    }
    if let Some(t) = temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err(Error::invalid_request("temperature must be between 0 and 2"));
        }
    }
    if max_tokens == Some(0) {
        return Err(Error::invalid_request("max_tokens must be positive"));
    }
    Ok(())
}

/// Parse a `retry-after` header as whole seconds, defaulting when the
/// header is absent or malformed.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> u64 {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}
