//! Data models shared by the streaming client, the REST collaborator and the
//! transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An agent as listed by the backend.
///
/// The streaming client treats it opaquely and sends it back whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(rename = "type", default)]
    pub agent_type: String,
}

impl Agent {
    /// Minimal agent with only an id and a display name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: String::new(),
            capabilities: Vec::new(),
            is_online: true,
            agent_type: String::new(),
        }
    }
}

/// A stored conversation. Only the id is interpreted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Role of the message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<Agent>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, agent: Option<Agent>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            agent,
        }
    }

    /// Id of the agent attached to this message, if any.
    pub fn agent_id(&self) -> Option<&str> {
        self.agent.as_ref().map(|a| a.id.as_str())
    }
}

/// Body of `POST /api/chat/stream`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    pub message: String,
    pub agent: Agent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

// --- Streamed payload ---
//
// Only the fields the client reads are modeled; unknown fields are ignored.

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<ChunkDelta>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stream_request_wire_shape() {
        let request = StreamRequest {
            message: "hi".to_string(),
            agent: Agent::new("a1", "Archie"),
            conversation_id: Some("c9".to_string()),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["message"], "hi");
        assert_eq!(value["conversationId"], "c9");
        assert_eq!(value["agent"]["id"], "a1");
        assert_eq!(value["agent"]["isOnline"], true);

        let request = StreamRequest {
            conversation_id: None,
            ..request
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("conversationId").is_none());
    }

    #[test]
    fn test_agent_from_backend_json() {
        let agent: Agent = serde_json::from_value(json!({
            "id": "doc",
            "name": "Doc Writer",
            "capabilities": ["markdown"],
            "isOnline": false,
            "type": "writer"
        }))
        .unwrap();
        assert_eq!(agent.agent_type, "writer");
        assert!(!agent.is_online);
        assert!(agent.description.is_empty());
    }

    #[test]
    fn test_conversation_keeps_unknown_fields() {
        let conversation: Conversation =
            serde_json::from_value(json!({"id": "c1", "title": "Planning"})).unwrap();
        assert_eq!(conversation.id, "c1");
        assert_eq!(conversation.extra["title"], "Planning");
    }
}
