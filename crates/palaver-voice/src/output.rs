//! Speech output - synthesize a reply to a file, then play it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::{AudioPlayer, Synthesizer};
use crate::error::VoiceError;
use crate::session::{ControlEvent, PlaybackEvent, SessionId};
use crate::text_utils::speakable_text;

/// Output configuration: where the artifact goes and which voice reads it.
#[derive(Debug, Clone)]
pub struct SpeechOutputConfig {
    pub artifact_dir: PathBuf,
    pub artifact_file_name: String,
    pub voice_id: String,
}

impl SpeechOutputConfig {
    /// Full path of the synthesized artifact.
    #[must_use]
    pub fn artifact_path(&self) -> PathBuf {
        self.artifact_dir.join(&self.artifact_file_name)
    }
}

/// Turns reply text into audible speech.
pub struct SpeechOutputSession {
    synthesizer: Arc<dyn Synthesizer>,
    player: Arc<dyn AudioPlayer>,
    config: SpeechOutputConfig,
}

impl SpeechOutputSession {
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        player: Arc<dyn AudioPlayer>,
        config: SpeechOutputConfig,
    ) -> Self {
        Self {
            synthesizer,
            player,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SpeechOutputConfig {
        &self.config
    }

    /// Speak `text`. Exactly one [`PlaybackEvent`] is reported for `session`
    /// unless the returned session is stopped or dropped first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn synthesize_and_play(
        &self,
        session: SessionId,
        text: &str,
        events: mpsc::UnboundedSender<ControlEvent>,
    ) -> PlaybackSession {
        let cancel = CancellationToken::new();
        let job = SpeechJob {
            synthesizer: Arc::clone(&self.synthesizer),
            player: Arc::clone(&self.player),
            voice_id: self.config.voice_id.clone(),
            artifact: self.config.artifact_path(),
            text: speakable_text(text),
        };

        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let event = match job.run(&token).await {
                Ok(()) => PlaybackEvent::Finished,
                Err(VoiceError::Cancelled) => {
                    tracing::debug!(%session, "Playback cancelled");
                    return;
                }
                Err(e) => {
                    tracing::warn!(%session, error = %e, "Speech output failed");
                    PlaybackEvent::Failed(e)
                }
            };
            let _ = events.send(ControlEvent::Playback { session, event });
        });

        PlaybackSession {
            id: session,
            cancel,
            task: Some(task),
        }
    }
}

struct SpeechJob {
    synthesizer: Arc<dyn Synthesizer>,
    player: Arc<dyn AudioPlayer>,
    voice_id: String,
    artifact: PathBuf,
    text: String,
}

impl SpeechJob {
    async fn run(self, cancel: &CancellationToken) -> Result<(), VoiceError> {
        if self.text.is_empty() {
            return Err(VoiceError::SynthesisError(
                "reply has no speakable text".to_string(),
            ));
        }
        if !self.synthesizer.has_voice(&self.voice_id) {
            return Err(VoiceError::SynthesisError(format!(
                "voice '{}' is not installed",
                self.voice_id
            )));
        }

        remove_stale_artifact(&self.artifact).await?;

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(VoiceError::Cancelled),
            result = self.synthesizer.synthesize_to_file(&self.text, &self.voice_id, &self.artifact) => result?,
        }
        if !tokio::fs::try_exists(&self.artifact).await.unwrap_or(false) {
            return Err(VoiceError::ArtifactMissing(self.artifact));
        }
        tracing::debug!(path = %self.artifact.display(), "Speech synthesized");

        // Opening the device and decoding block, keep them off the runtime.
        let (done_tx, done_rx) = oneshot::channel();
        let player = Arc::clone(&self.player);
        let artifact = self.artifact.clone();
        let handle = tokio::task::spawn_blocking(move || {
            player.play(
                &artifact,
                Box::new(move || {
                    let _ = done_tx.send(());
                }),
            )
        })
        .await
        .map_err(|e| VoiceError::PlaybackError(format!("player task failed: {e}")))??;

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                // Wait for the device to be released before reporting back.
                let _ = tokio::task::spawn_blocking(move || handle.stop()).await;
                Err(VoiceError::Cancelled)
            }
            done = done_rx => {
                let _ = tokio::task::spawn_blocking(move || handle.stop()).await;
                done.map_err(|_| VoiceError::PlaybackError("player ended without completing".to_string()))
            }
        }
    }
}

async fn remove_stale_artifact(path: &Path) -> Result<(), VoiceError> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Owns one synthesize-then-play job.
///
/// [`stop`](Self::stop) cancels synthesis or playback and returns once the
/// output device is released. Dropping cancels without waiting.
#[derive(Debug)]
pub struct PlaybackSession {
    id: SessionId,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PlaybackSession {
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(session = %self.id, error = %e, "Playback task ended abnormally");
            }
        }
        tracing::debug!(session = %self.id, "Playback stopped");
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
