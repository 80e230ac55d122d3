//! Per-request streaming state, cancellation and the caller-facing callback
//! contract.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::client::ClientError;

/// Receives the output of one `send_message` call.
///
/// All methods run synchronously on the task driving the stream, in decode
/// order. For a single call, either `on_complete` or `on_error` runs at most
/// once and never both; a cancelled call invokes nothing.
pub trait StreamHandler: Send + Sync {
    /// An incremental, non-empty text delta.
    fn on_chunk(&self, chunk: &str);

    /// The `[DONE]` sentinel arrived; `full_response` is every delta joined.
    fn on_complete(&self, full_response: &str);

    /// The call failed for a reason other than cancellation.
    fn on_error(&self, error: &ClientError);
}

impl<H: StreamHandler + ?Sized> StreamHandler for Arc<H> {
    fn on_chunk(&self, chunk: &str) {
        (**self).on_chunk(chunk)
    }

    fn on_complete(&self, full_response: &str) {
        (**self).on_complete(full_response)
    }

    fn on_error(&self, error: &ClientError) {
        (**self).on_error(error)
    }
}

type ChunkFn = Box<dyn Fn(&str) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&ClientError) + Send + Sync>;

/// Closure-based [`StreamHandler`]. Unset callbacks do nothing.
///
/// # Example
/// ```
/// use streamchat::stream::Callbacks;
///
/// let callbacks = Callbacks::new()
///     .on_chunk(|chunk| print!("{chunk}"))
///     .on_complete(|full| println!("\n({} chars)", full.len()));
/// ```
#[derive(Default)]
pub struct Callbacks {
    chunk: Option<ChunkFn>,
    complete: Option<ChunkFn>,
    error: Option<ErrorFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_chunk(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.chunk = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&ClientError) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("chunk", &self.chunk.is_some())
            .field("complete", &self.complete.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

impl StreamHandler for Callbacks {
    fn on_chunk(&self, chunk: &str) {
        if let Some(f) = &self.chunk {
            f(chunk);
        }
    }

    fn on_complete(&self, full_response: &str) {
        if let Some(f) = &self.complete {
            f(full_response);
        }
    }

    fn on_error(&self, error: &ClientError) {
        if let Some(f) = &self.error {
            f(error);
        }
    }
}

/// Cancellation handle for one in-flight request.
///
/// Clones share the same underlying token.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    id: u64,
    token: CancellationToken,
}

impl AbortHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            token: CancellationToken::new(),
        }
    }

    /// Signal the request to stop. Idempotent.
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sequence number of the request this handle belongs to.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) async fn aborted(&self) {
        self.token.cancelled().await
    }
}

/// Lifecycle of the most recent `send_message` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPhase {
    #[default]
    Idle,
    /// Request dispatched, no body yet.
    Sending,
    /// Decode loop running.
    Streaming,
    /// `[DONE]` observed.
    Completed,
    /// Body ended without `[DONE]`.
    Ended,
    Cancelled,
    Failed,
}

impl StreamPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Ended | Self::Cancelled | Self::Failed
        )
    }
}

/// Snapshot of the client's request state.
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    pub is_loading: bool,
    pub error: Option<ClientError>,
    pub handle: Option<AbortHandle>,
    pub phase: StreamPhase,
}

/// How a successful `send_message` call finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The sentinel arrived; `on_complete` received the same text.
    Completed(String),
    /// The body ended without the sentinel. `on_complete` was not called.
    Ended(String),
    /// Aborted by the caller or superseded by a newer call.
    Cancelled,
}

impl StreamOutcome {
    /// Text accumulated before the call finished, if it was not cancelled.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Completed(text) | Self::Ended(text) => Some(text),
            Self::Cancelled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_abort_handle_clones_share_token() {
        let handle = AbortHandle::new(7);
        let clone = handle.clone();
        assert!(!handle.is_aborted());
        clone.abort();
        assert!(handle.is_aborted());
        assert_eq!(handle.id(), 7);
    }

    #[test]
    fn test_callbacks_dispatch() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chunks = seen.clone();
        let errors = seen.clone();
        let callbacks = Callbacks::new()
            .on_chunk(move |c| chunks.lock().push(format!("chunk:{c}")))
            .on_error(move |e| errors.lock().push(format!("error:{e}")));

        StreamHandler::on_chunk(&callbacks, "a");
        StreamHandler::on_complete(&callbacks, "ignored");
        StreamHandler::on_error(&callbacks, &ClientError::NoAgentSelected);

        assert_eq!(
            *seen.lock(),
            vec!["chunk:a".to_string(), "error:No agent selected".to_string()]
        );
    }

    #[test]
    fn test_terminal_phases() {
        assert!(!StreamPhase::Idle.is_terminal());
        assert!(!StreamPhase::Streaming.is_terminal());
        assert!(StreamPhase::Ended.is_terminal());
        assert!(StreamPhase::Cancelled.is_terminal());
    }

    #[test]
    fn test_outcome_text() {
        assert_eq!(StreamOutcome::Completed("x".into()).text(), Some("x"));
        assert_eq!(StreamOutcome::Cancelled.text(), None);
    }
}
