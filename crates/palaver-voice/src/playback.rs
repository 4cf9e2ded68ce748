//! Audio file playback via `rodio`.
//!
//! Each [`RodioPlayer::play`] call opens the default output device on its own
//! thread (the `rodio` output stream is not `Send` on every platform), decodes
//! the file into a [`Sink`] and waits for it to drain. The returned handle
//! can stop the sink early; `on_done` only fires for natural completion.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use rodio::{Decoder, OutputStream, Sink};

use crate::backend::{AudioPlayer, PlaybackDoneCallback, PlaybackHandle};
use crate::error::VoiceError;

/// Plays audio files on the default output device.
#[derive(Debug, Clone, Copy, Default)]
pub struct RodioPlayer;

impl RodioPlayer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl AudioPlayer for RodioPlayer {
    fn play(
        &self,
        path: &Path,
        on_done: PlaybackDoneCallback,
    ) -> Result<Box<dyn PlaybackHandle>, VoiceError> {
        let file = File::open(path)
            .map_err(|e| VoiceError::PlaybackError(format!("{}: {e}", path.display())))?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| VoiceError::PlaybackError(format!("{}: {e}", path.display())))?;

        let stopped = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<Arc<Sink>, VoiceError>>();

        let thread_stopped = Arc::clone(&stopped);
        let thread = std::thread::Builder::new()
            .name("palaver-playback".to_string())
            .spawn(move || {
                let (_stream, stream_handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(VoiceError::PlaybackError(e.to_string())));
                        return;
                    }
                };
                let sink = match Sink::try_new(&stream_handle) {
                    Ok(sink) => Arc::new(sink),
                    Err(e) => {
                        let _ = ready_tx.send(Err(VoiceError::PlaybackError(e.to_string())));
                        return;
                    }
                };
                sink.append(source);
                let _ = ready_tx.send(Ok(Arc::clone(&sink)));

                // Returns early when stop() clears the queue.
                sink.sleep_until_end();

                if thread_stopped.load(Ordering::SeqCst) {
                    return;
                }
                tracing::debug!("Playback finished naturally");
                on_done();
            })
            .map_err(|e| VoiceError::PlaybackError(format!("failed to spawn playback thread: {e}")))?;

        let sink = ready_rx
            .recv()
            .map_err(|_| VoiceError::PlaybackError("playback thread exited early".to_string()))??;

        tracing::debug!(path = %path.display(), "Audio playback started");
        Ok(Box::new(RodioPlayback {
            sink,
            stopped,
            thread: Some(thread),
        }))
    }
}

struct RodioPlayback {
    sink: Arc<Sink>,
    stopped: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RodioPlayback {
    fn halt(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.sink.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("Playback thread panicked");
            }
        }
    }
}

impl PlaybackHandle for RodioPlayback {
    fn stop(mut self: Box<Self>) {
        self.halt();
        tracing::debug!("Audio playback stopped");
    }
}

impl Drop for RodioPlayback {
    fn drop(&mut self) {
        self.halt();
    }
}
