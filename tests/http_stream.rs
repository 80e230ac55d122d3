use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use streamchat::client::{ClientError, StreamingChatClient};
use streamchat::http::HttpChatTransport;
use streamchat::model::Agent;
use streamchat::options::{HttpTransport, TransportOptions};
use streamchat::stream::{Callbacks, StreamOutcome};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HELLO_STREAM: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n\
data: [DONE]\n\n";

fn recording_callbacks() -> (Callbacks, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let callbacks = Callbacks::new()
        .on_chunk({
            let log = log.clone();
            move |c| log.lock().push(format!("chunk:{c}"))
        })
        .on_complete({
            let log = log.clone();
            move |full| log.lock().push(format!("complete:{full}"))
        })
        .on_error({
            let log = log.clone();
            move |e| log.lock().push(format!("error:{e}"))
        });
    (callbacks, log)
}

fn http_client(
    server: &MockServer,
    credential: Option<&str>,
) -> (
    StreamingChatClient<HttpChatTransport, Callbacks>,
    Arc<Mutex<Vec<String>>>,
) {
    let mut transport = HttpTransport::new(server.uri());
    if let Some(token) = credential {
        transport = transport.with_credential(token);
    }
    let (callbacks, log) = recording_callbacks();
    let client = StreamingChatClient::over_http(TransportOptions::new(transport), callbacks)
        .unwrap()
        .with_agent(Agent::new("agent-1", "Archie"));
    (client, log)
}

#[tokio::test]
async fn streams_reply_with_bearer_and_request_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_partial_json(json!({
            "message": "say hello",
            "agent": { "id": "agent-1" },
            "conversationId": "conv-7"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(HELLO_STREAM),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, log) = http_client(&server, Some("secret-token"));
    client.set_conversation_id(Some("conv-7".to_string()));

    let outcome = client.send_message("say hello").await.unwrap();

    assert_eq!(outcome, StreamOutcome::Completed("Hello".to_string()));
    assert_eq!(
        *log.lock(),
        vec!["chunk:Hel", "chunk:lo", "complete:Hello"]
    );
    assert!(!client.is_loading());
}

#[tokio::test]
async fn omits_authorization_without_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_string(HELLO_STREAM))
        .mount(&server)
        .await;

    let (client, _) = http_client(&server, None);
    client.send_message("x").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("conversationId").is_none());
}

#[tokio::test]
async fn server_error_reports_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let (client, log) = http_client(&server, None);
    let err = client.send_message("x").await.unwrap_err();

    assert!(matches!(err, ClientError::HttpError { status: 500 }));
    assert_eq!(*log.lock(), vec!["error:HTTP error! status: 500"]);
    assert!(!client.is_loading());
}

#[tokio::test]
async fn no_content_response_has_no_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (client, _) = http_client(&server, None);
    let err = client.send_message("x").await.unwrap_err();

    assert!(matches!(err, ClientError::NoStreamAvailable));
}

#[tokio::test]
async fn missing_agent_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _) = http_client(&server, None);
    client.set_agent(None);

    let err = client.send_message("x").await.unwrap_err();
    assert!(matches!(err, ClientError::NoAgentSelected));
}

#[tokio::test]
async fn abort_while_waiting_for_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(HELLO_STREAM)
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let (client, log) = http_client(&server, None);
    let client = Arc::new(client);

    let task = tokio::spawn({
        let client = client.clone();
        async move { client.send_message("x").await }
    });
    while !client.is_loading() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.abort();

    let outcome = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("abort should end the call promptly")
        .unwrap()
        .unwrap();

    assert_eq!(outcome, StreamOutcome::Cancelled);
    assert!(log.lock().is_empty());
    assert!(!client.is_loading());
}
