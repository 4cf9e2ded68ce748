//! CLI-specific error types and exit codes.

use palaver_core::{ChatError, PathError, SettingsError};
use palaver_voice::VoiceError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// No API key on the command line or in the environment.
    #[error("No Gemini API key: pass --api-key or set GEMINI_API_KEY")]
    MissingApiKey,

    /// Settings or paths could not be loaded or saved.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The remote model failed.
    #[error("Chat failed: {0}")]
    Chat(String),

    /// The voice loop could not be set up.
    #[error("Voice error: {0}")]
    Voice(String),

    /// The user refused microphone access.
    #[error("Microphone permission denied")]
    PermissionDenied,

    /// IO error (terminal, files).
    #[error("IO error: {0}")]
    Io(String),
}

impl CliError {
    /// Map error to an exit code (sysexits.h where one fits).
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::MissingApiKey | Self::Config(_) => 78, // EX_CONFIG
            Self::Chat(_) => 69,                         // EX_UNAVAILABLE
            Self::Voice(_) => 1,
            Self::PermissionDenied => 77, // EX_NOPERM
            Self::Io(_) => 74,            // EX_IOERR
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<ChatError> for CliError {
    fn from(err: ChatError) -> Self {
        Self::Chat(err.message().to_string())
    }
}

impl From<VoiceError> for CliError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::PermissionDenied => Self::PermissionDenied,
            other => Self::Voice(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
