//! Server-Sent Events (SSE) frame decoding.
//!
//! The chat backend streams newline-delimited frames:
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//!
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//!
//! data: [DONE]
//! ```
//!
//! Reads may split a line, or a multi-byte UTF-8 character, at any byte.
//! [`FrameDecoder`] carries both across reads so frames are only classified
//! once their line is complete.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::client::ClientError;
use crate::model::CompletionChunk;

/// One classified line of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Payload of a `data: ` line, prefix stripped.
    Data(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Incremental, UTF-8 safe line decoder.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes of a character whose tail has not arrived yet.
    pending: Vec<u8>,
    /// Decoded text of the current incomplete line.
    text: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read's worth of bytes, returning every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.text[start..].find('\n') {
            let end = start + pos;
            if let Some(frame) = classify_line(&self.text[start..end]) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.text.drain(..start);
        frames
    }

    /// Flush at end of stream: a final line without a trailing newline is
    /// still classified. A truncated character decodes as U+FFFD.
    pub fn finish(&mut self) -> Vec<Frame> {
        if !self.pending.is_empty() {
            self.text.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }

        let rest = std::mem::take(&mut self.text);
        rest.split('\n').filter_map(classify_line).collect()
    }

    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.text.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    self.text
                        .push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        // Invalid sequence in the middle: replace it and keep going.
                        Some(bad) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        // Incomplete sequence at the end: wait for the next read.
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Classify one line, without its `\n`. Only a single trailing `\r` is
/// removed; the `data: ` prefix must start the line.
fn classify_line(line: &str) -> Option<Frame> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() {
        return None;
    }

    let data = parse_sse_line(line)?;
    if is_done_marker(data) {
        Some(Frame::Done)
    } else {
        Some(Frame::Data(data.to_string()))
    }
}

/// Extension trait turning a byte stream into a stream of [`Frame`]s.
///
/// # Example
/// ```ignore
/// use streamchat::sse::{Frame, FrameStreamExt};
///
/// let mut frames = response.bytes_stream().frames();
/// while let Some(frame) = frames.next().await {
///     if frame? == Frame::Done {
///         break;
///     }
/// }
/// ```
pub trait FrameStreamExt {
    /// Decode the stream into frames, ending when the bytes end.
    ///
    /// The `[DONE]` sentinel is yielded as [`Frame::Done`] rather than
    /// swallowed, so callers can tell it apart from a truncated stream.
    fn frames(self) -> impl Stream<Item = Result<Frame, ClientError>> + Send;
}

impl<S, E> FrameStreamExt for S
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<ClientError> + Send + 'static,
{
    fn frames(self) -> impl Stream<Item = Result<Frame, ClientError>> + Send {
        stream::unfold(
            (Box::pin(self), FrameDecoder::new(), VecDeque::new(), false),
            |(mut byte_stream, mut decoder, mut ready, mut stream_ended)| async move {
                loop {
                    if let Some(frame) = ready.pop_front() {
                        return Some((Ok(frame), (byte_stream, decoder, ready, stream_ended)));
                    }

                    if stream_ended {
                        return None;
                    }

                    match byte_stream.next().await {
                        Some(Ok(chunk)) => ready.extend(decoder.push(&chunk)),
                        Some(Err(e)) => {
                            let err: ClientError = e.into();
                            stream_ended = true;
                            return Some((Err(err), (byte_stream, decoder, ready, stream_ended)));
                        }
                        None => {
                            stream_ended = true;
                            ready.extend(decoder.finish());
                        }
                    }
                }
            },
        )
    }
}

/// Parse an SSE line to extract the data portion.
///
/// # Example
/// ```
/// use streamchat::sse::parse_sse_line;
///
/// assert_eq!(parse_sse_line("data: {\"key\": \"value\"}"), Some("{\"key\": \"value\"}"));
/// assert_eq!(parse_sse_line(": keep-alive"), None);
/// assert_eq!(parse_sse_line("  data: x"), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data: ")
}

/// Check if an SSE data line is the end-of-stream sentinel.
///
/// # Example
/// ```
/// use streamchat::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}

/// Pull `choices[0].delta.content` out of a data payload.
///
/// Returns `Ok(None)` when the payload is well formed but carries no text,
/// and `ClientError::MalformedFrame` when it is not JSON of the expected shape.
pub fn extract_delta(payload: &str) -> Result<Option<String>, ClientError> {
    let chunk: CompletionChunk = serde_json::from_str(payload)
        .map_err(|e| ClientError::MalformedFrame(e.to_string()))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty()))
}
