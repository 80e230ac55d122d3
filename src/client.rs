//! Streaming chat client, its transport seam and error types.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::http::HttpChatTransport;
use crate::model::{Agent, StreamRequest};
use crate::options::{ClientOptions, HttpTransport, InFlightPolicy, TransportOptions};
use crate::sse::{extract_delta, Frame, FrameStreamExt};
use crate::stream::{AbortHandle, StreamHandler, StreamOutcome, StreamPhase, StreamState};

/// Errors that can occur during client operations.
///
/// Cloneable so one value can be stored as the client's current error,
/// handed to `on_error` and returned to the caller.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error("No agent selected")]
    NoAgentSelected,

    #[error("HTTP error! status: {status}")]
    HttpError { status: u16 },

    #[error("No response stream available")]
    NoStreamAvailable,

    #[error("A request is already in flight")]
    AlreadyInFlight,

    /// A data frame whose payload is not the expected JSON. Never escapes the
    /// decode loop.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Stream cancelled")]
    Cancelled,

    #[error("Transport error: {0}")]
    Transport(Arc<reqwest::Error>),

    #[error("JSON parse error: {0}")]
    Parse(Arc<serde_json::Error>),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(Arc::new(e))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(Arc::new(e))
    }
}

/// Response body as an incremental byte stream.
pub type ByteStream = BoxStream<'static, Result<Bytes, ClientError>>;

/// What a transport hands back once response headers have arrived.
pub struct TransportResponse {
    pub status: u16,
    /// `None` when the response has no incrementally readable body.
    pub body: Option<ByteStream>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Opens the streaming chat request.
///
/// Implement this to run the client over something other than HTTP, or to
/// script responses in tests. Dropping the returned future or body must
/// release the underlying request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, request: &StreamRequest) -> Result<TransportResponse, ClientError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn open(&self, request: &StreamRequest) -> Result<TransportResponse, ClientError> {
        (**self).open(request).await
    }
}

#[derive(Debug, Default)]
struct Inner {
    agent: Option<Agent>,
    conversation_id: Option<String>,
    state: StreamState,
}

/// Sends chat messages and consumes the streamed reply.
///
/// One request is in flight at a time; what happens to a second call is
/// governed by [`InFlightPolicy`]. With `CancelPrevious` the older call is
/// aborted and resolves as `StreamOutcome::Cancelled` while the newer call
/// owns the state.
///
/// # Example
/// ```no_run
/// use streamchat::client::StreamingChatClient;
/// use streamchat::model::Agent;
/// use streamchat::options::{HttpTransport, TransportOptions};
/// use streamchat::stream::Callbacks;
///
/// # async fn run() -> Result<(), streamchat::ClientError> {
/// let client = StreamingChatClient::over_http(
///     TransportOptions::new(HttpTransport::from_env()),
///     Callbacks::new().on_chunk(|chunk| print!("{chunk}")),
/// )?
/// .with_agent(Agent::new("rag", "Knowledge Agent"));
///
/// client.send_message("What changed in the last release?").await?;
/// # Ok(())
/// # }
/// ```
pub struct StreamingChatClient<T, H> {
    transport: T,
    handler: H,
    options: ClientOptions,
    inner: Mutex<Inner>,
    next_id: AtomicU64,
}

impl<H: StreamHandler> StreamingChatClient<HttpChatTransport, H> {
    /// Client over the reqwest-backed HTTP transport.
    pub fn over_http(
        transport_options: TransportOptions<HttpTransport>,
        handler: H,
    ) -> Result<Self, ClientError> {
        Ok(Self::new(HttpChatTransport::new(transport_options)?, handler))
    }
}

impl<T: Transport, H: StreamHandler> StreamingChatClient<T, H> {
    pub fn new(transport: T, handler: H) -> Self {
        Self {
            transport,
            handler,
            options: ClientOptions::default(),
            inner: Mutex::new(Inner::default()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_agent(self, agent: Agent) -> Self {
        self.set_agent(Some(agent));
        self
    }

    pub fn with_conversation_id(self, conversation_id: impl Into<String>) -> Self {
        self.set_conversation_id(Some(conversation_id.into()));
        self
    }

    /// Bind (or unbind) the agent used by subsequent calls.
    pub fn set_agent(&self, agent: Option<Agent>) {
        self.inner.lock().agent = agent;
    }

    pub fn agent(&self) -> Option<Agent> {
        self.inner.lock().agent.clone()
    }

    pub fn set_conversation_id(&self, conversation_id: Option<String>) {
        self.inner.lock().conversation_id = conversation_id;
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.inner.lock().conversation_id.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().state.is_loading
    }

    /// Error of the most recent failed call, cleared when a new call starts.
    pub fn error(&self) -> Option<ClientError> {
        self.inner.lock().state.error.clone()
    }

    pub fn phase(&self) -> StreamPhase {
        self.inner.lock().state.phase
    }

    pub fn state(&self) -> StreamState {
        self.inner.lock().state.clone()
    }

    /// Handle for the in-flight request, if any.
    pub fn cancellation_handle(&self) -> Option<AbortHandle> {
        self.inner.lock().state.handle.clone()
    }

    /// Abort the in-flight request. No-op when idle.
    pub fn abort(&self) {
        if let Some(handle) = &self.inner.lock().state.handle {
            debug!(request_id = handle.id(), "Aborting chat stream");
            handle.abort();
        }
    }

    /// Send `content` to the bound agent and stream the reply to the handler.
    ///
    /// Resolves once the stream completes, ends, is cancelled or fails. A
    /// failure other than `AlreadyInFlight` is reported once through
    /// `on_error` and stored as the client's error unless another call is
    /// still running.
    pub async fn send_message(
        &self,
        content: impl Into<String>,
    ) -> Result<StreamOutcome, ClientError> {
        let (request, handle) = match self.begin(content.into()) {
            Ok(started) => started,
            // The running call still owns the state.
            Err(ClientError::AlreadyInFlight) => return Err(ClientError::AlreadyInFlight),
            Err(e) => {
                {
                    // A running call owns the error slot.
                    let mut inner = self.inner.lock();
                    if inner.state.handle.is_none() {
                        inner.state.error = Some(e.clone());
                    }
                }
                self.handler.on_error(&e);
                return Err(e);
            }
        };

        let mut guard = CallGuard {
            inner: &self.inner,
            handle: handle.clone(),
            phase: StreamPhase::Cancelled,
        };

        debug!(
            request_id = handle.id(),
            agent = %request.agent.id,
            conversation = ?request.conversation_id,
            "Sending chat message"
        );

        let result = self.run(&request, &handle).await;

        match &result {
            Ok(outcome) => {
                guard.phase = match outcome {
                    StreamOutcome::Completed(_) => StreamPhase::Completed,
                    StreamOutcome::Ended(_) => StreamPhase::Ended,
                    StreamOutcome::Cancelled => StreamPhase::Cancelled,
                };
                debug!(request_id = handle.id(), phase = ?guard.phase, "Chat stream finished");
            }
            Err(e) => {
                guard.phase = StreamPhase::Failed;
                warn!(request_id = handle.id(), error = %e, "Chat stream failed");
                {
                    let mut inner = self.inner.lock();
                    if owns(&inner, &handle) {
                        inner.state.error = Some(e.clone());
                    }
                }
                self.handler.on_error(e);
            }
        }

        result
    }

    fn begin(&self, message: String) -> Result<(StreamRequest, AbortHandle), ClientError> {
        let mut inner = self.inner.lock();
        let agent = inner.agent.clone().ok_or(ClientError::NoAgentSelected)?;

        if let Some(previous) = inner.state.handle.take() {
            match self.options.in_flight {
                InFlightPolicy::Reject => {
                    inner.state.handle = Some(previous);
                    return Err(ClientError::AlreadyInFlight);
                }
                InFlightPolicy::CancelPrevious => {
                    warn!(request_id = previous.id(), "Cancelling in-flight chat stream");
                    previous.abort();
                }
            }
        }

        let handle = AbortHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        inner.state = StreamState {
            is_loading: true,
            error: None,
            handle: Some(handle.clone()),
            phase: StreamPhase::Sending,
        };

        let request = StreamRequest {
            message,
            agent,
            conversation_id: inner.conversation_id.clone(),
        };
        Ok((request, handle))
    }

    async fn run(
        &self,
        request: &StreamRequest,
        handle: &AbortHandle,
    ) -> Result<StreamOutcome, ClientError> {
        let response = tokio::select! {
            biased;
            _ = handle.aborted() => return Ok(StreamOutcome::Cancelled),
            response = self.transport.open(request) => response?,
        };

        if !response.is_success() {
            return Err(ClientError::HttpError {
                status: response.status,
            });
        }

        let body = response.body.ok_or(ClientError::NoStreamAvailable)?;
        self.set_phase(handle, StreamPhase::Streaming);

        let mut frames = Box::pin(body.frames());
        let mut accumulated = String::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = handle.aborted() => return Ok(StreamOutcome::Cancelled),
                next = frames.next() => next,
            };

            let Some(frame) = next else {
                debug!(request_id = handle.id(), "Stream ended without [DONE]");
                return Ok(StreamOutcome::Ended(accumulated));
            };

            // A handler may abort from inside a callback.
            if handle.is_aborted() {
                return Ok(StreamOutcome::Cancelled);
            }

            match frame? {
                Frame::Done => {
                    self.handler.on_complete(&accumulated);
                    return Ok(StreamOutcome::Completed(accumulated));
                }
                Frame::Data(payload) => match extract_delta(&payload) {
                    Ok(Some(content)) => {
                        accumulated.push_str(&content);
                        self.handler.on_chunk(&content);
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "Failed to parse streaming chunk"),
                },
            }
        }
    }

    fn set_phase(&self, handle: &AbortHandle, phase: StreamPhase) {
        let mut inner = self.inner.lock();
        if owns(&inner, handle) {
            inner.state.phase = phase;
        }
    }
}

fn owns(inner: &Inner, handle: &AbortHandle) -> bool {
    inner
        .state
        .handle
        .as_ref()
        .is_some_and(|current| current.id() == handle.id())
}

/// Resets the busy state when a call finishes, including when its future is
/// dropped mid-stream. A superseded call leaves the newer call's state alone.
struct CallGuard<'a> {
    inner: &'a Mutex<Inner>,
    handle: AbortHandle,
    phase: StreamPhase,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if owns(&inner, &self.handle) {
            inner.state.is_loading = false;
            inner.state.handle = None;
            inner.state.phase = self.phase;
        }
    }
}
