//! Platform capability seams for the voice loop.
//!
//! Each trait is the narrow surface the loop needs from a platform service:
//! a speech recognizer, the microphone permission gate, a speech
//! synthesizer that renders to a file and a player for that file. Concrete
//! implementations live next to their platform (see [`command`] and
//! [`crate::playback`]) and test doubles live in the tests.

pub mod command;

use std::path::Path;

use async_trait::async_trait;

use crate::error::VoiceError;
use crate::input::RecognitionSink;

/// Language model a recognizer should tune for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LanguageModel {
    /// Open-ended dictation.
    #[default]
    FreeForm,
    /// Short search-style queries.
    WebSearch,
}

/// Parameters for one recognizer pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionRequest {
    /// BCP-47 language tag, e.g. `en-US`.
    pub language: String,
    pub language_model: LanguageModel,
    /// Whether the recognizer should report partial transcripts.
    pub partial_results: bool,
    /// Upper bound on alternative transcripts per result.
    pub max_results: u8,
    /// Prefer on-device recognition when the platform has it.
    pub prefer_offline: bool,
}

impl Default for RecognitionRequest {
    fn default() -> Self {
        Self {
            language: palaver_core::settings::DEFAULT_LANGUAGE.to_string(),
            language_model: LanguageModel::FreeForm,
            partial_results: true,
            max_results: 1,
            prefer_offline: true,
        }
    }
}

/// Speech-to-text engine.
///
/// A pass delivers events through the [`RecognitionSink`] it was started
/// with. The sink forwards at most one terminal event (final transcript or
/// error) and drops anything reported after that.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Whether the platform offers recognition at all.
    fn is_available(&self) -> bool;

    /// Begin one listening pass.
    async fn start(
        &self,
        request: RecognitionRequest,
        sink: RecognitionSink,
    ) -> Result<Box<dyn RecognitionHandle>, VoiceError>;
}

/// A running recognizer pass.
#[async_trait]
pub trait RecognitionHandle: Send {
    /// Stop listening and release the microphone. Returns once released.
    async fn stop(self: Box<Self>);
}

/// Microphone permission gate.
#[async_trait]
pub trait MicrophonePermission: Send + Sync {
    /// Current grant state, without prompting.
    fn is_granted(&self) -> bool;

    /// Prompt for the permission. Returns the user's answer.
    async fn request(&self) -> bool;
}

/// Text-to-speech engine that renders into an audio file.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Whether the given voice is installed.
    fn has_voice(&self, voice_id: &str) -> bool;

    /// Render `text` with `voice_id` into `output`.
    ///
    /// Dropping the returned future aborts the render.
    async fn synthesize_to_file(
        &self,
        text: &str,
        voice_id: &str,
        output: &Path,
    ) -> Result<(), VoiceError>;
}

/// Callback invoked when playback finishes naturally.
pub type PlaybackDoneCallback = Box<dyn FnOnce() + Send + 'static>;

/// Plays an audio file on the media stream.
pub trait AudioPlayer: Send + Sync {
    /// Start playing `path`. `on_done` fires only when the file drains,
    /// never after [`PlaybackHandle::stop`].
    fn play(
        &self,
        path: &Path,
        on_done: PlaybackDoneCallback,
    ) -> Result<Box<dyn PlaybackHandle>, VoiceError>;
}

/// A playing audio file.
pub trait PlaybackHandle: Send {
    /// Stop playback and release the output device. Blocks until released.
    fn stop(self: Box<Self>);
}

/// Permission source with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub bool);

#[async_trait]
impl MicrophonePermission for StaticPermission {
    fn is_granted(&self) -> bool {
        self.0
    }

    async fn request(&self) -> bool {
        self.0
    }
}
