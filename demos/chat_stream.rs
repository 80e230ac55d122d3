//! Interactive chat against a running backend.
//!
//! Run with:
//! ```bash
//! export CHAT_API_BASE_URL="http://localhost:8181"
//! export CHAT_API_TOKEN="your-token"   # optional
//! cargo run --example chat_stream
//! ```
//!
//! Type a message and press enter; Ctrl-C aborts the reply in progress.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use streamchat::api::ChatApi;
use streamchat::client::StreamingChatClient;
use streamchat::options::{HttpTransport, TransportOptions};
use streamchat::stream::{Callbacks, StreamOutcome};
use streamchat::transcript::Transcript;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,streamchat=info".into()),
        )
        .with_target(false)
        .init();

    let transport_options = TransportOptions::new(HttpTransport::from_env());

    let agents = ChatApi::new(transport_options.clone())?.list_agents().await?;
    let Some(agent) = agents.into_iter().find(|a| a.is_online) else {
        eprintln!("No online agents available");
        return Ok(());
    };
    println!("Chatting with {} ({})", agent.name, agent.agent_type);

    let transcript = Arc::new(Mutex::new(Transcript::new()));
    let callbacks = Callbacks::new()
        .on_chunk({
            let transcript = transcript.clone();
            let agent = agent.clone();
            move |chunk| {
                transcript.lock().apply_chunk(chunk, Some(&agent));
                print!("{}", chunk);
                let _ = std::io::stdout().flush();
            }
        })
        .on_error({
            let transcript = transcript.clone();
            move |e| {
                transcript.lock().push_system(format!("Message failed: {}", e));
                eprintln!("\nError: {}", e);
            }
        });

    let client = Arc::new(
        StreamingChatClient::over_http(transport_options, callbacks)?.with_agent(agent.clone()),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print!("> ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            print!("> ");
            std::io::stdout().flush()?;
            continue;
        }

        transcript.lock().push_user(line.as_str(), Some(&agent));

        let send = client.send_message(line);
        tokio::pin!(send);
        let result = tokio::select! {
            result = &mut send => result,
            _ = tokio::signal::ctrl_c() => {
                client.abort();
                send.await
            }
        };

        match result {
            Ok(StreamOutcome::Completed(_)) => println!(),
            Ok(StreamOutcome::Ended(_)) => println!("\n[stream ended early]"),
            Ok(StreamOutcome::Cancelled) => println!("\n[aborted]"),
            // Already reported through on_error.
            Err(_) => {}
        }

        print!("> ");
        std::io::stdout().flush()?;
    }

    println!("\n{} messages in transcript", transcript.lock().len());
    Ok(())
}
