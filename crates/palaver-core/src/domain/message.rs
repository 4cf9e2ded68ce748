//! Conversation turns and the ordered log that owns them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chat::{ChatRole, ChatTurn};

/// Opaque unique identity of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Model,
    Error,
}

impl From<ChatRole> for Speaker {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::User => Self::User,
            ChatRole::Model => Self::Model,
        }
    }
}

/// One turn of the conversation as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub speaker: Speaker,
    /// Set while a user message is waiting for the model's reply.
    pub pending: bool,
}

/// Ordered record of the conversation, newest last.
///
/// At most one message is pending at any time. Messages are never removed;
/// failures are appended as [`Speaker::Error`] entries.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    /// Create an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Build a log from prior chat history, skipping blank turns.
    #[must_use]
    pub fn seeded(history: &[ChatTurn]) -> Self {
        let messages = history
            .iter()
            .filter(|turn| !turn.text.trim().is_empty())
            .map(|turn| Message {
                id: MessageId::new(),
                text: turn.text.clone(),
                speaker: turn.role.into(),
                pending: false,
            })
            .collect();
        Self { messages }
    }

    /// Append a message at the end and return a copy of it.
    ///
    /// Appending a pending message while another one is still pending
    /// resolves the older one first so the single-pending invariant holds.
    pub fn append(&mut self, text: impl Into<String>, speaker: Speaker, pending: bool) -> Message {
        if pending {
            if let Some(stale) = self.pending().map(|m| m.id) {
                tracing::warn!(%stale, "Appending a pending message while another is pending");
                self.resolve(stale);
            }
        }

        let message = Message {
            id: MessageId::new(),
            text: text.into(),
            speaker,
            pending,
        };
        self.messages.push(message.clone());
        message
    }

    /// Clear the pending flag on the last message, if it is pending.
    ///
    /// No-op on an empty log or when the last message is not pending.
    pub fn resolve_pending(&mut self) {
        if let Some(last) = self.messages.last_mut() {
            if last.pending {
                last.pending = false;
            }
        }
    }

    /// Clear the pending flag on the message with the given identity.
    ///
    /// Returns `true` if a pending message with that id was found.
    pub fn resolve(&mut self, id: MessageId) -> bool {
        match self.messages.iter_mut().rev().find(|m| m.id == id) {
            Some(message) if message.pending => {
                message.pending = false;
                true
            }
            _ => false,
        }
    }

    /// A point-in-time copy of the log.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Borrow the messages in conversation order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The currently pending message, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.pending)
    }

    /// The newest message.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
