//! Voice mode error types.

use std::path::PathBuf;

/// Errors that can occur in the voice loop.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// Microphone permission denied.
    #[error("Microphone permission denied")]
    PermissionDenied,

    /// The platform offers no speech recognition capability.
    #[error("Speech recognition is not available on this device")]
    RecognitionUnavailable,

    /// A capture session is already outstanding.
    #[error("A capture session is already active")]
    AlreadyActive,

    /// Failed to synthesize speech (unknown voice, engine failure).
    #[error("Speech synthesis failed: {0}")]
    SynthesisError(String),

    /// The synthesized artifact could not be opened or played.
    #[error("Playback failed: {0}")]
    PlaybackError(String),

    /// Synthesized artifact missing where it should have been written.
    #[error("Speech artifact not found at {0}")]
    ArtifactMissing(PathBuf),

    /// Audio stream volume could not be changed.
    #[error("Failed to change audio stream {stream}: {reason}")]
    Mixer { stream: String, reason: String },

    /// IO error (artifact directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation cancelled by pause or teardown.
    #[error("Voice operation cancelled")]
    Cancelled,
}

/// Terminal error of one recognizer pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognitionError {
    /// Speech was heard but nothing matched.
    #[error("No speech recognized")]
    NoMatch,

    /// Nothing was said before the recognizer gave up.
    #[error("Speech timeout")]
    Timeout,

    /// Unrecoverable recognizer failure.
    #[error("{0}")]
    Fatal(String),
}

impl RecognitionError {
    /// Whether the loop should silently restart capture.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoMatch | Self::Timeout)
    }
}
