//! Audio ducking - silence competing system streams while the loop is
//! listening or speaking.
//!
//! [`AudioDuckingGuard::acquire`] hands out a [`DuckingLease`]. The first
//! lease mutes every [`DUCKED_STREAMS`] entry after recording its prior
//! state. Nested leases only bump a counter. When the last lease is released
//! each stream goes back to what it was before the first acquire, so a
//! stream the user had muted stays muted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::VoiceError;

/// A system audio stream class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioStream {
    Notification,
    Alarm,
    Ring,
    System,
    Media,
}

impl AudioStream {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::Alarm => "alarm",
            Self::Ring => "ring",
            Self::System => "system",
            Self::Media => "media",
        }
    }
}

impl std::fmt::Display for AudioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Streams silenced while a lease is held.
pub const DUCKED_STREAMS: [AudioStream; 5] = [
    AudioStream::Notification,
    AudioStream::Alarm,
    AudioStream::Ring,
    AudioStream::System,
    AudioStream::Media,
];

/// Process-wide stream mute control.
#[cfg_attr(test, mockall::automock)]
pub trait StreamMixer: Send + Sync {
    /// Whether `stream` is currently muted.
    fn is_muted(&self, stream: AudioStream) -> bool;

    /// Mute or unmute `stream`.
    fn set_muted(&self, stream: AudioStream, muted: bool) -> Result<(), VoiceError>;
}

/// In-process mixer table.
///
/// Used where the platform offers no per-stream control; the table is the
/// source of truth for anything in this process that checks it.
#[derive(Debug, Clone, Default)]
pub struct SoftwareMixer {
    muted: Arc<Mutex<HashMap<AudioStream, bool>>>,
}

impl SoftwareMixer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamMixer for SoftwareMixer {
    fn is_muted(&self, stream: AudioStream) -> bool {
        self.muted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&stream)
            .copied()
            .unwrap_or(false)
    }

    fn set_muted(&self, stream: AudioStream, muted: bool) -> Result<(), VoiceError> {
        self.muted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(stream, muted);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct DuckState {
    depth: usize,
    saved: Vec<(AudioStream, bool)>,
}

/// Shared ducking controller. Clones share one lease counter.
#[derive(Clone)]
pub struct AudioDuckingGuard {
    mixer: Arc<dyn StreamMixer>,
    state: Arc<Mutex<DuckState>>,
}

impl AudioDuckingGuard {
    pub fn new(mixer: Arc<dyn StreamMixer>) -> Self {
        Self {
            mixer,
            state: Arc::new(Mutex::new(DuckState::default())),
        }
    }

    /// Take a lease. Streams are muted when the first lease is taken.
    #[must_use = "streams are restored as soon as the lease is dropped"]
    pub fn acquire(&self) -> DuckingLease {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.depth == 0 {
            state.saved = DUCKED_STREAMS
                .iter()
                .map(|&stream| (stream, self.mixer.is_muted(stream)))
                .collect();
            for stream in DUCKED_STREAMS {
                if let Err(e) = self.mixer.set_muted(stream, true) {
                    tracing::warn!(%stream, error = %e, "Failed to duck audio stream");
                }
            }
            tracing::debug!("Audio streams ducked");
        }
        state.depth += 1;

        DuckingLease {
            guard: Some(self.clone()),
        }
    }

    /// Number of outstanding leases.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .depth
    }

    /// Whether any lease is outstanding.
    #[must_use]
    pub fn is_ducked(&self) -> bool {
        self.depth() > 0
    }

    fn release_one(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.depth == 0 {
            tracing::warn!("Ducking lease released with no outstanding leases");
            return;
        }
        state.depth -= 1;
        if state.depth > 0 {
            return;
        }

        for (stream, was_muted) in std::mem::take(&mut state.saved) {
            if let Err(e) = self.mixer.set_muted(stream, was_muted) {
                tracing::warn!(%stream, error = %e, "Failed to restore audio stream");
            }
        }
        tracing::debug!("Audio streams restored");
    }
}

impl std::fmt::Debug for AudioDuckingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDuckingGuard")
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}

/// One outstanding duck. Released exactly once, on [`release`](Self::release)
/// or drop.
#[derive(Debug)]
pub struct DuckingLease {
    guard: Option<AudioDuckingGuard>,
}

impl DuckingLease {
    pub fn release(mut self) {
        if let Some(guard) = self.guard.take() {
            guard.release_one();
        }
    }
}

impl Drop for DuckingLease {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            guard.release_one();
        }
    }
}
