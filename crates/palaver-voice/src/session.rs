//! Session identity and the events sessions report back to the loop.

use palaver_core::{ChatError, MessageId};

use crate::error::{RecognitionError, VoiceError};

/// Identifies one capture or playback session.
///
/// Ids come from a single per-loop counter, so an event carrying an id that
/// is not the active session's is stale and must be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out increasing session ids.
#[derive(Debug, Default)]
pub struct SessionCounter {
    last: u64,
}

impl SessionCounter {
    pub const fn issue(&mut self) -> SessionId {
        self.last += 1;
        SessionId(self.last)
    }
}

/// Events from a recognizer pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Interim transcript; may be revised.
    Partial(String),
    /// Final transcript. Terminal.
    Final(String),
    /// Recognition ended without a transcript. Terminal.
    Error(RecognitionError),
}

impl CaptureEvent {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Partial(_))
    }
}

/// Terminal outcome of a playback session.
#[derive(Debug)]
pub enum PlaybackEvent {
    Finished,
    Failed(VoiceError),
}

/// User-facing commands accepted by the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// The conversation screen became visible.
    Start,
    Pause,
    Resume,
    TogglePause,
    /// Ask for microphone permission again after a denial.
    RetryPermission,
    /// Send typed text as if it had been spoken.
    SendText(String),
    /// Tear the loop down.
    Shutdown,
}

/// Everything the loop reacts to, in arrival order.
#[derive(Debug)]
pub enum ControlEvent {
    Command(UserCommand),
    PermissionResolved { granted: bool },
    Capture { session: SessionId, event: CaptureEvent },
    Reply { turn: MessageId, result: Result<String, ChatError> },
    Playback { session: SessionId, event: PlaybackEvent },
}

impl From<UserCommand> for ControlEvent {
    fn from(command: UserCommand) -> Self {
        Self::Command(command)
    }
}
