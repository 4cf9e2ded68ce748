//! Conversation states and the values published to observers.

use palaver_core::Message;
use serde::Serialize;

/// Current state of the hands-free loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// Waiting for the user to answer the microphone prompt.
    AwaitingPermission,
    /// Ready, not yet listening.
    Idle,
    /// Capturing speech.
    Listening,
    /// A transcript was accepted and is being handed to the model.
    Recognizing,
    /// Waiting for the model's reply.
    AwaitingReply,
    /// Playing back the reply.
    Speaking,
    /// Nothing is captured or played until resumed.
    Paused,
    /// Torn down. Terminal.
    Exiting,
}

impl ConversationState {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::AwaitingPermission => "awaiting permission",
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Recognizing => "recognizing",
            Self::AwaitingReply => "thinking",
            Self::Speaking => "speaking",
            Self::Paused => "paused",
            Self::Exiting => "exiting",
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable view of the loop, replaced wholesale on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSnapshot {
    pub state: ConversationState,
    pub messages: Vec<Message>,
    /// Latest partial or final transcript of the current pass.
    pub transcript: String,
    /// Most recent user-visible failure, cleared on resume.
    pub last_error: Option<String>,
}

impl ConversationSnapshot {
    #[must_use]
    pub const fn initial(state: ConversationState, messages: Vec<Message>) -> Self {
        Self {
            state,
            messages,
            transcript: String::new(),
            last_error: None,
        }
    }
}

/// Notifications emitted while the loop runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    StateChanged {
        from: ConversationState,
        to: ConversationState,
    },
    Transcript { text: String, is_final: bool },
    MessageAppended(Message),
    Error(String),
}
