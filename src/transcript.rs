//! Ordered message list for a chat view.
//!
//! Streamed deltas are folded into the trailing assistant message as long as
//! it belongs to the same agent; anything else starts a new message.

use crate::model::{Agent, Message, Role};

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the user's message and return it.
    pub fn push_user(&mut self, content: impl Into<String>, agent: Option<&Agent>) -> &Message {
        self.push(Message::new(Role::User, content, agent.cloned()))
    }

    /// Append a system notice, e.g. a failed-send marker.
    pub fn push_system(&mut self, content: impl Into<String>) -> &Message {
        self.push(Message::new(Role::System, content, None))
    }

    /// Fold one streamed delta into the transcript.
    pub fn apply_chunk(&mut self, chunk: &str, agent: Option<&Agent>) -> &Message {
        let agent_id = agent.map(|a| a.id.as_str());
        let extends_last = self
            .messages
            .last()
            .is_some_and(|last| last.role == Role::Assistant && last.agent_id() == agent_id);

        if extends_last {
            let index = self.messages.len() - 1;
            let last = &mut self.messages[index];
            last.content.push_str(chunk);
            return last;
        }

        self.push(Message::new(Role::Assistant, chunk, agent.cloned()))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        let index = self.messages.len() - 1;
        &self.messages[index]
    }
}
