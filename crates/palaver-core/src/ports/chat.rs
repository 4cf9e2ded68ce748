//! Chat session port definition.
//!
//! This port is the boundary towards the remote generative model. One
//! session holds one conversation's history; successive [`ChatSession::send`]
//! calls share that context.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::chat::ChatTurn;

/// Errors returned by a chat session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    /// The request failed, was rejected, or produced no content.
    ///
    /// The message is shown to the user verbatim.
    #[error("{0}")]
    Remote(String),
}

impl ChatError {
    /// Build a remote error, falling back to a generic message when the
    /// underlying failure carried no description.
    pub fn remote(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            Self::Remote("Unknown error".to_string())
        } else {
            Self::Remote(message)
        }
    }

    /// The human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Remote(message) => message,
        }
    }
}

/// Port for exchanging messages with the remote model.
///
/// Implementations make a single attempt per call; retry policy belongs to
/// the caller. History is seeded once at construction and only grows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Send a user utterance and return the model's reply text.
    async fn send(&self, text: &str) -> Result<String, ChatError>;

    /// The committed history, oldest first.
    fn history(&self) -> Vec<ChatTurn>;
}
