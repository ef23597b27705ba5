//! Server-Sent Events (SSE) stream decoder.
//!
//! Converts the raw byte stream of a `streamGenerateContent?alt=sse`
//! response into [`StreamChunk`]s.
//!
//! ## Framing
//!
//! Cloud Code emits line-oriented SSE:
//!
//! ```text
//! data: {"response":{"candidates":[...]}}
//!
//! data: {"candidates":[...],"usageMetadata":{...}}
//! ```
//!
//! Bytes are buffered and split on line feeds; the trailing partial segment
//! after the last line feed is retained and completed by the next read, so a
//! chunk boundary can fall anywhere - mid-line, mid-JSON value, even inside
//! a UTF-8 code point - without changing the decoded sequence. Only complete
//! lines are decoded (lossily) to text. When the source ends, the retained
//! segment is flushed through the same rule.
//!
//! A malformed JSON payload in one event drops that event, counts it on the
//! shared [`DroppedEvents`] handle and decoding continues; a single bad
//! event never terminates the stream.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::Stream;
use pin_project_lite::pin_project;
use tracing::debug;

use super::error::{Error, Result};
use super::models::StreamChunk;

/// Observable counter of events dropped for malformed payloads.
///
/// Clones share the underlying counter, so a handle taken before streaming
/// reflects drops observed during it.
#[derive(Debug, Clone, Default)]
pub struct DroppedEvents(Arc<AtomicU64>);

impl DroppedEvents {
    /// Number of events dropped so far.
    pub fn count(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

/// Parse one SSE line into its `data` payload.
///
/// The line is split into `field: value` at the first colon; only a `data`
/// field yields a payload. Empty lines, lines without a colon and other
/// fields (`event`, `id`, comments) yield nothing.
pub(crate) fn parse_sse_line(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (field, value) = line.split_once(':')?;
    if field.trim() != "data" {
        return None;
    }

    Some(value.trim())
}

/// Incremental line-buffering decoder; the synchronous core of
/// [`SseStream`].
#[derive(Debug)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    dropped: DroppedEvents,
}

impl SseDecoder {
    pub(crate) fn new(dropped: DroppedEvents) -> Self {
        Self {
            buffer: Vec::new(),
            dropped,
        }
    }

    /// Feed one network read; complete lines decode into `out`.
    pub(crate) fn feed(&mut self, bytes: &[u8], out: &mut VecDeque<StreamChunk>) {
        self.buffer.extend_from_slice(bytes);

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode_line(&line[..pos], out);
        }
    }

    /// Flush the retained trailing segment after end-of-data.
    pub(crate) fn finish(&mut self, out: &mut VecDeque<StreamChunk>) {
        if self.buffer.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line, out);
    }

    fn decode_line(&self, line: &[u8], out: &mut VecDeque<StreamChunk>) {
        let text = String::from_utf8_lossy(line);
        let Some(payload) = parse_sse_line(&text) else {
            return;
        };

        match StreamChunk::from_json(payload) {
            Ok(chunk) => out.push_back(chunk),
            Err(e) => {
                debug!(
                    error = %e,
                    payload = %payload.chars().take(100).collect::<String>(),
                    "Dropping malformed stream event"
                );
                self.dropped.increment();
            }
        }
    }
}

pin_project! {
    /// Adapts a byte stream into a stream of decoded [`StreamChunk`]s.
    ///
    /// The sequence is lazy, finite and non-restartable. Dropping the
    /// stream drops the underlying byte source on every exit path - normal
    /// completion, early break by the consumer, or error.
    pub struct SseStream<S> {
        #[pin]
        byte_stream: S,
        decoder: SseDecoder,
        pending: VecDeque<StreamChunk>,
        done: bool,
    }
}

impl<S> SseStream<S>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>>,
{
    /// Create a new decoder over `byte_stream`.
    pub fn new(byte_stream: S) -> Self {
        Self {
            byte_stream,
            decoder: SseDecoder::new(DroppedEvents::default()),
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Handle to the dropped-event counter; valid after the stream is gone.
    pub fn dropped_events(&self) -> DroppedEvents {
        self.decoder.dropped.clone()
    }
}

impl<S> Stream for SseStream<S>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>>,
{
    type Item = Result<StreamChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(chunk) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(chunk)));
            }

            if *this.done {
                return Poll::Ready(None);
            }

            match this.byte_stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.decoder.feed(&bytes, this.pending);
                }
                Poll::Ready(Some(Err(e))) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(Error::from(e))));
                }
                Poll::Ready(None) => {
                    *this.done = true;
                    this.decoder.finish(this.pending);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
