//! # streamchat - streaming chat client
//!
//! A small client library for an agent chat backend. It sends a message to
//! the selected agent and consumes the reply as a stream of `data:` frames,
//! handing each text delta to the caller as soon as it is decoded.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - UTF-8 safe incremental SSE decoding (split lines and split characters)
//! - Cancellable, single-flight requests with an explicit in-flight policy
//! - Callback contract: `on_chunk`, `on_complete`, `on_error`
//! - Listing endpoints for agents and conversations
//!
//! ## Core Types
//!
//! - **`StreamingChatClient<T, H>`**: drives one request at a time over a `Transport`
//! - **`StreamHandler`**: receives deltas, the completed reply, or the error
//! - **`AbortHandle`**: cancels the in-flight request
//! - **`TransportOptions<HttpTransport>`**: base URL, credential, timeout, proxy
//!
//! ## Example
//! ```no_run
//! use streamchat::client::StreamingChatClient;
//! use streamchat::model::Agent;
//! use streamchat::options::{HttpTransport, TransportOptions};
//! use streamchat::stream::{Callbacks, StreamOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport_options = TransportOptions::new(
//!         HttpTransport::new("http://localhost:8181").with_credential("your-token"),
//!     );
//!
//!     let callbacks = Callbacks::new()
//!         .on_chunk(|chunk| print!("{}", chunk))
//!         .on_error(|e| eprintln!("stream failed: {}", e));
//!
//!     let client = StreamingChatClient::over_http(transport_options, callbacks)?
//!         .with_agent(Agent::new("rag-agent", "Knowledge Agent"));
//!
//!     if let StreamOutcome::Completed(reply) = client.send_message("Hello!").await? {
//!         println!("\n{} chars", reply.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod http;
pub mod model;
pub mod options;
pub mod sse;
pub mod stream;
pub mod transcript;

// Re-exports for convenience
pub use api::ChatApi;
pub use client::{ClientError, StreamingChatClient, Transport};
pub use model::{Agent, Conversation, Message, StreamRequest};
pub use stream::{AbortHandle, Callbacks, StreamHandler, StreamOutcome};
