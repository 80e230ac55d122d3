//! HTTP plumbing: client construction, request decoration and the
//! reqwest-backed streaming transport.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::debug;

use crate::client::{ClientError, Transport, TransportResponse};
use crate::model::StreamRequest;
use crate::options::{HttpTransport, SecretString, TransportOptions};

/// Path of the streaming chat endpoint below `/api`.
pub const CHAT_STREAM_PATH: &str = "chat/stream";

/// Build a configured HTTP client from transport options.
///
/// The timeout covers the whole exchange, including reading a streamed body,
/// so leave it unset for long-running chats.
pub fn build_http_client(
    transport_options: &TransportOptions<HttpTransport>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    if let Some(timeout) = transport_options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &transport_options.provider.proxy {
        if let Ok(proxy) = reqwest::Proxy::all(proxy_url) {
            builder = builder.proxy(proxy);
        }
    }

    builder.build()
}

/// Add extra headers to a request if specified in transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// Attach `Authorization: Bearer ...` when a credential is configured.
pub fn add_bearer(request: RequestBuilder, credential: &Option<SecretString>) -> RequestBuilder {
    match credential {
        Some(secret) => request.header(AUTHORIZATION, format!("Bearer {}", secret.expose_secret())),
        None => request,
    }
}

/// Streams chat replies from `POST {base}/api/chat/stream`.
#[derive(Debug, Clone)]
pub struct HttpChatTransport {
    http_client: Client,
    transport_options: TransportOptions<HttpTransport>,
}

impl HttpChatTransport {
    pub fn new(transport_options: TransportOptions<HttpTransport>) -> Result<Self, ClientError> {
        let http_client = build_http_client(&transport_options)?;
        Ok(Self {
            http_client,
            transport_options,
        })
    }

    pub fn transport_options(&self) -> &TransportOptions<HttpTransport> {
        &self.transport_options
    }
}

#[async_trait]
impl Transport for HttpChatTransport {
    async fn open(&self, request: &StreamRequest) -> Result<TransportResponse, ClientError> {
        let provider = &self.transport_options.provider;
        let url = provider.endpoint(CHAT_STREAM_PATH);

        let mut req = self
            .http_client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream");

        req = add_bearer(req, &provider.credential);
        req = add_extra_headers(req, &provider.extra_headers);

        let response = req.json(request).send().await?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), "Chat stream response");

        // 204 carries no body to read incrementally.
        let body = if status == StatusCode::NO_CONTENT {
            None
        } else {
            Some(response.bytes_stream().map_err(ClientError::from).boxed())
        };

        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_build_http_client() {
        let transport_options = TransportOptions {
            timeout: Some(Duration::from_secs(30)),
            provider: HttpTransport::new("http://localhost:8181").with_credential("test"),
        };

        assert!(build_http_client(&transport_options).is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let transport_options = TransportOptions::new(
            HttpTransport::default().with_proxy("http://proxy.example.com:8080".to_string()),
        );

        assert!(build_http_client(&transport_options).is_ok());
    }

    #[test]
    fn test_bearer_only_when_configured() {
        let client = Client::new();

        let req = add_bearer(client.get("http://localhost/"), &Some("tok".into()))
            .build()
            .unwrap();
        assert_eq!(req.headers()[AUTHORIZATION], "Bearer tok");

        let req = add_bearer(client.get("http://localhost/"), &None)
            .build()
            .unwrap();
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }
}
