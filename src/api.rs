//! REST collaborator for listing agents and conversations.
//!
//! Plain request/response calls: no retry, no streaming. The bearer
//! credential comes from the transport options, never from ambient storage.

use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::ClientError;
use crate::http::{add_bearer, add_extra_headers, build_http_client};
use crate::model::{Agent, Conversation};
use crate::options::{HttpTransport, TransportOptions};

const AGENTS_PATH: &str = "agents";
const CONVERSATIONS_PATH: &str = "conversations";

/// Client for the backend's listing endpoints.
#[derive(Debug, Clone)]
pub struct ChatApi {
    http_client: Client,
    transport_options: TransportOptions<HttpTransport>,
}

impl ChatApi {
    pub fn new(transport_options: TransportOptions<HttpTransport>) -> Result<Self, ClientError> {
        let http_client = build_http_client(&transport_options)?;
        Ok(Self {
            http_client,
            transport_options,
        })
    }

    /// `GET {base}/api/agents`
    pub async fn list_agents(&self) -> Result<Vec<Agent>, ClientError> {
        self.get_json(AGENTS_PATH).await
    }

    /// `GET {base}/api/conversations`
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ClientError> {
        self.get_json(CONVERSATIONS_PATH).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let provider = &self.transport_options.provider;
        let url = provider.endpoint(path);

        let mut req = self
            .http_client
            .get(&url)
            .header(ACCEPT, "application/json");
        req = add_bearer(req, &provider.credential);
        req = add_extra_headers(req, &provider.extra_headers);

        let response = req.send().await?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), "Listing response");

        if !status.is_success() {
            return Err(ClientError::HttpError {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
