//! Speech input - one recognizer pass per [`CaptureSession`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use crate::backend::{MicrophonePermission, RecognitionHandle, RecognitionRequest, Recognizer};
use crate::error::{RecognitionError, VoiceError};
use crate::session::{CaptureEvent, ControlEvent, SessionId};

/// Where a recognizer pass reports its events.
///
/// Forwards partial transcripts until the first terminal event (final
/// transcript or error), then goes quiet. Also goes quiet once the owning
/// [`CaptureSession`] has been stopped. Cheap to clone into engine callbacks.
#[derive(Debug, Clone)]
pub struct RecognitionSink {
    session: SessionId,
    events: mpsc::UnboundedSender<ControlEvent>,
    closed: Arc<AtomicBool>,
}

impl RecognitionSink {
    /// The capture session this sink reports for.
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Interim transcript.
    pub fn partial(&self, text: impl Into<String>) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        self.send(CaptureEvent::Partial(text.into()));
    }

    /// Final transcript. Terminal.
    pub fn finish(&self, text: impl Into<String>) {
        self.terminal(CaptureEvent::Final(text.into()));
    }

    /// Recognition failed or heard nothing. Terminal.
    pub fn fail(&self, error: RecognitionError) {
        self.terminal(CaptureEvent::Error(error));
    }

    /// Whether further events will be dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn terminal(&self, event: CaptureEvent) {
        if self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(session = %self.session, ?event, "Dropping event after terminal");
            return;
        }
        self.send(event);
    }

    fn send(&self, event: CaptureEvent) {
        // The loop may already be gone during teardown.
        let _ = self.events.send(ControlEvent::Capture {
            session: self.session,
            event,
        });
    }
}

/// Starts recognizer passes, at most one at a time.
pub struct SpeechInputSession {
    recognizer: Arc<dyn Recognizer>,
    permission: Arc<dyn MicrophonePermission>,
    request: RecognitionRequest,
    active: Arc<AtomicBool>,
}

impl SpeechInputSession {
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        permission: Arc<dyn MicrophonePermission>,
        request: RecognitionRequest,
    ) -> Self {
        Self {
            recognizer,
            permission,
            request,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a capture session is outstanding.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Begin listening. Events for `session` are delivered to `events`.
    ///
    /// # Errors
    ///
    /// - [`VoiceError::RecognitionUnavailable`] if the platform cannot recognize speech
    /// - [`VoiceError::PermissionDenied`] if the microphone permission is not granted
    /// - [`VoiceError::AlreadyActive`] if another capture session has not been stopped
    pub async fn start(
        &self,
        session: SessionId,
        events: mpsc::UnboundedSender<ControlEvent>,
    ) -> Result<CaptureSession, VoiceError> {
        if !self.recognizer.is_available() {
            return Err(VoiceError::RecognitionUnavailable);
        }
        if !self.permission.is_granted() {
            return Err(VoiceError::PermissionDenied);
        }
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(VoiceError::AlreadyActive);
        }

        let closed = Arc::new(AtomicBool::new(false));
        let sink = RecognitionSink {
            session,
            events,
            closed: Arc::clone(&closed),
        };

        match self.recognizer.start(self.request.clone(), sink).await {
            Ok(handle) => {
                tracing::debug!(%session, language = %self.request.language, "Capture started");
                Ok(CaptureSession {
                    id: session,
                    handle: Some(handle),
                    closed,
                    active: Arc::clone(&self.active),
                })
            }
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

/// Owns one running recognizer pass.
///
/// [`stop`](Self::stop) releases the recognizer and waits for it. Dropping
/// without stopping still silences the sink and hands the recognizer stop
/// to the runtime.
pub struct CaptureSession {
    id: SessionId,
    handle: Option<Box<dyn RecognitionHandle>>,
    closed: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
}

impl CaptureSession {
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Stop listening. No events are delivered for this session afterwards.
    pub async fn stop(mut self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.stop().await;
        }
        self.active.store(false, Ordering::SeqCst);
        tracing::debug!(session = %self.id, "Capture stopped");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.closed.store(true, Ordering::SeqCst);
        let active = Arc::clone(&self.active);
        let session = self.id;

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                handle.stop().await;
                active.store(false, Ordering::SeqCst);
                tracing::debug!(%session, "Capture released after drop");
            });
        } else {
            drop(handle);
            active.store(false, Ordering::SeqCst);
            tracing::warn!(%session, "Capture dropped outside a runtime");
        }
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("running", &self.handle.is_some())
            .finish()
    }
}
