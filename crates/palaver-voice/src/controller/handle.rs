//! Presentation-side handle to a running conversation loop.

use tokio::sync::{mpsc, watch};

use super::state::ConversationSnapshot;
use crate::session::{ControlEvent, UserCommand};

/// Sends commands to the loop and reads its published snapshots.
///
/// Commands are queued behind any events already waiting and take effect
/// when the loop reaches them. Sending to a loop that has exited is a no-op.
#[derive(Debug, Clone)]
pub struct ConversationHandle {
    events: mpsc::UnboundedSender<ControlEvent>,
    snapshots: watch::Receiver<ConversationSnapshot>,
}

impl ConversationHandle {
    pub(super) const fn new(
        events: mpsc::UnboundedSender<ControlEvent>,
        snapshots: watch::Receiver<ConversationSnapshot>,
    ) -> Self {
        Self { events, snapshots }
    }

    /// The conversation became visible: ask for permission or start listening.
    pub fn start(&self) {
        self.command(UserCommand::Start);
    }

    pub fn pause(&self) {
        self.command(UserCommand::Pause);
    }

    pub fn resume(&self) {
        self.command(UserCommand::Resume);
    }

    pub fn toggle_pause(&self) {
        self.command(UserCommand::TogglePause);
    }

    pub fn retry_permission(&self) {
        self.command(UserCommand::RetryPermission);
    }

    /// Send typed text as the user's next turn.
    pub fn send_text(&self, text: impl Into<String>) {
        self.command(UserCommand::SendText(text.into()));
    }

    /// Stop everything and end the loop.
    pub fn shutdown(&self) {
        self.command(UserCommand::Shutdown);
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that wakes on every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.snapshots.clone()
    }

    /// Whether the loop has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    fn command(&self, command: UserCommand) {
        if self.events.send(command.into()).is_err() {
            tracing::debug!("Conversation loop has exited; command dropped");
        }
    }
}
