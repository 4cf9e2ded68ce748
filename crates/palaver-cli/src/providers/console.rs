//! Console recognizer and permission prompt.
//!
//! Both are fed by the terminal input router: a typed line is what the user
//! "said" while a listening pass is open, or the answer to the microphone
//! prompt while one is outstanding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use palaver_voice::backend::{
    MicrophonePermission, RecognitionHandle, RecognitionRequest, Recognizer,
};
use palaver_voice::input::RecognitionSink;
use palaver_voice::{RecognitionError, VoiceError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type LineSlot = Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>;

/// Recognizer that takes one typed line per listening pass.
///
/// An empty line is reported as `NoMatch`; no line within the silence
/// timeout is reported as `Timeout`.
#[derive(Debug, Clone)]
pub struct ConsoleRecognizer {
    current: LineSlot,
    silence_timeout: Duration,
}

impl ConsoleRecognizer {
    #[must_use]
    pub fn new(silence_timeout: Duration) -> Self {
        Self {
            current: Arc::new(Mutex::new(None)),
            silence_timeout,
        }
    }

    /// Offer a typed line to the open listening pass.
    ///
    /// Returns `false` when nothing is listening.
    pub fn feed(&self, line: &str) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| tx.send(line.to_string()).is_ok())
    }

    /// Whether a listening pass is open.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[async_trait]
impl Recognizer for ConsoleRecognizer {
    fn is_available(&self) -> bool {
        true
    }

    async fn start(
        &self,
        request: RecognitionRequest,
        sink: RecognitionSink,
    ) -> Result<Box<dyn RecognitionHandle>, VoiceError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);

        let timeout = self.silence_timeout;
        let slot = Arc::clone(&self.current);
        tracing::debug!(
            language = %request.language,
            model = ?request.language_model,
            prefer_offline = request.prefer_offline,
            "Console listening pass opened"
        );

        let task = tokio::spawn(async move {
            let line = tokio::time::timeout(timeout, rx.recv()).await;
            slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            match line {
                Ok(Some(line)) => {
                    let text = line.trim();
                    if text.is_empty() {
                        sink.fail(RecognitionError::NoMatch);
                    } else {
                        if request.partial_results {
                            sink.partial(text);
                        }
                        sink.finish(text);
                    }
                }
                Ok(None) => sink.fail(RecognitionError::Fatal("console input closed".into())),
                Err(_) => sink.fail(RecognitionError::Timeout),
            }
        });

        Ok(Box::new(ConsolePass {
            task,
            slot: Arc::clone(&self.current),
        }))
    }
}

struct ConsolePass {
    task: JoinHandle<()>,
    slot: LineSlot,
}

#[async_trait]
impl RecognitionHandle for ConsolePass {
    async fn stop(self: Box<Self>) {
        let Self { task, slot } = *self;
        task.abort();
        let _ = task.await;
        slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// Microphone permission answered on the console.
#[derive(Debug, Default)]
pub struct ConsolePermission {
    granted: AtomicBool,
    pending: Mutex<Option<oneshot::Sender<bool>>>,
}

impl ConsolePermission {
    #[must_use]
    pub fn new(pre_granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(pre_granted),
            pending: Mutex::new(None),
        }
    }

    /// Whether a prompt is waiting for an answer.
    #[must_use]
    pub fn is_asking(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Answer an outstanding prompt with a typed line (`y`/`yes` grants).
    ///
    /// Returns `false` when no prompt is outstanding.
    pub fn answer(&self, line: &str) -> bool {
        let Some(tx) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return false;
        };
        let granted = matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes");
        let _ = tx.send(granted);
        true
    }
}

#[async_trait]
impl MicrophonePermission for ConsolePermission {
    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    async fn request(&self) -> bool {
        if self.is_granted() {
            return true;
        }

        let (tx, rx) = oneshot::channel();
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        println!("Allow palaver to use the microphone? [y/N]");

        let granted = rx.await.unwrap_or(false);
        self.granted.store(granted, Ordering::SeqCst);
        granted
    }
}
