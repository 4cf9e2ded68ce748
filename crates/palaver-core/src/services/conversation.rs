//! Conversation bookkeeping - one user turn in, one reply or error out.

use std::sync::Arc;

use crate::domain::message::{Message, MessageId, MessageLog, Speaker};
use crate::ports::chat::{ChatError, ChatSession};

/// What a finished chat request added to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The model answered with speakable text.
    Reply(Message),
    /// The model answered with nothing but whitespace.
    Empty,
    /// The request failed; the error entry was appended.
    Failed(Message),
}

impl ReplyOutcome {
    /// Text worth speaking aloud, if any.
    #[must_use]
    pub fn reply_text(&self) -> Option<&str> {
        match self {
            Self::Reply(message) => Some(&message.text),
            Self::Empty | Self::Failed(_) => None,
        }
    }
}

/// Resolve the pending user message `turn` and record the request result.
///
/// The pending flag is cleared before anything is appended, so the log never
/// shows a reply next to a still-pending user message.
pub fn record_reply(
    log: &mut MessageLog,
    turn: MessageId,
    result: Result<String, ChatError>,
) -> ReplyOutcome {
    if !log.resolve(turn) {
        tracing::debug!(%turn, "Reply arrived for a turn that is no longer pending");
    }

    match result {
        Ok(text) if text.trim().is_empty() => ReplyOutcome::Empty,
        Ok(text) => ReplyOutcome::Reply(log.append(text, Speaker::Model, false)),
        Err(e) => ReplyOutcome::Failed(log.append(e.message(), Speaker::Error, false)),
    }
}

/// Text-only conversation over a [`ChatSession`].
pub struct ConversationService {
    chat: Arc<dyn ChatSession>,
    log: MessageLog,
}

impl ConversationService {
    /// Start a conversation, seeding the log from the session's history.
    pub fn new(chat: Arc<dyn ChatSession>) -> Self {
        let log = MessageLog::seeded(&chat.history());
        Self { chat, log }
    }

    /// Send one user message and wait for the outcome.
    pub async fn send_message(&mut self, text: &str) -> ReplyOutcome {
        let turn = self.log.append(text, Speaker::User, true).id;
        let result = self.chat.send(text).await;
        record_reply(&mut self.log, turn, result)
    }

    /// The conversation so far.
    #[must_use]
    pub const fn log(&self) -> &MessageLog {
        &self.log
    }
}
