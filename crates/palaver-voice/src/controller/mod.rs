//! Conversation controller - the hands-free state machine.
//!
//! ```text
//! AwaitingPermission ─granted─▶ Listening ─final─▶ Recognizing ─▶ AwaitingReply
//!        │                        ▲   │                                 │
//!      denied                     │   └─NoMatch/Timeout─▶ (restart)     │ reply
//!        ▼                        │                                     ▼
//!     Exiting            Idle ────┘◀──────── playback done ──────── Speaking
//! ```
//!
//! Every input (user command, permission answer, recognizer event, chat
//! reply, playback outcome) is a [`ControlEvent`] on one queue, handled in
//! arrival order by [`ConversationController::handle_event`]. Capture and
//! playback sessions carry a [`SessionId`]; events from a session that is
//! no longer active are dropped. Observers read
//! [`ConversationSnapshot`]s from a `watch` channel.

mod handle;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use palaver_core::{
    ChatError, ChatSession, MessageId, MessageLog, ReplyOutcome, Settings, Speaker, record_reply,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub use handle::ConversationHandle;
pub use state::{ConversationEvent, ConversationSnapshot, ConversationState};

use crate::backend::{AudioPlayer, MicrophonePermission, RecognitionRequest, Recognizer, Synthesizer};
use crate::ducking::{AudioDuckingGuard, DuckingLease, StreamMixer};
use crate::error::{RecognitionError, VoiceError};
use crate::input::{CaptureSession, SpeechInputSession};
use crate::output::{PlaybackSession, SpeechOutputConfig, SpeechOutputSession};
use crate::session::{
    CaptureEvent, ControlEvent, PlaybackEvent, SessionCounter, SessionId, UserCommand,
};

/// Platform services the loop runs on.
pub struct ConversationDeps {
    pub chat: Arc<dyn ChatSession>,
    pub recognizer: Arc<dyn Recognizer>,
    pub permission: Arc<dyn MicrophonePermission>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub player: Arc<dyn AudioPlayer>,
    pub mixer: Arc<dyn StreamMixer>,
}

/// Loop configuration.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    pub recognition: RecognitionRequest,
    pub output: SpeechOutputConfig,
    /// Speak a reply that arrived while paused once the loop resumes.
    pub speak_deferred_replies: bool,
}

impl ConversationConfig {
    /// Derive the loop configuration from user settings.
    #[must_use]
    pub fn from_settings(settings: &Settings, artifact_dir: PathBuf) -> Self {
        Self {
            recognition: RecognitionRequest {
                language: settings.language.clone(),
                ..RecognitionRequest::default()
            },
            output: SpeechOutputConfig {
                artifact_dir,
                artifact_file_name: settings.artifact_file_name.clone(),
                voice_id: settings.voice_id.clone(),
            },
            speak_deferred_replies: settings.speak_deferred_replies,
        }
    }
}

struct ActiveCapture {
    session: CaptureSession,
    lease: DuckingLease,
}

struct ActivePlayback {
    session: PlaybackSession,
    lease: DuckingLease,
}

struct InFlightReply {
    turn: MessageId,
    task: JoinHandle<()>,
}

/// Owns the conversation and every session it starts.
pub struct ConversationController {
    state: ConversationState,
    log: MessageLog,
    chat: Arc<dyn ChatSession>,
    permission: Arc<dyn MicrophonePermission>,
    input: SpeechInputSession,
    output: SpeechOutputSession,
    ducking: AudioDuckingGuard,
    speak_deferred_replies: bool,

    sessions: SessionCounter,
    capture: Option<ActiveCapture>,
    playback: Option<ActivePlayback>,
    in_flight: Option<InFlightReply>,
    permission_task: Option<JoinHandle<()>>,
    deferred_reply: Option<String>,
    recognition_unavailable: bool,
    transcript: String,
    last_error: Option<String>,

    events_tx: mpsc::UnboundedSender<ControlEvent>,
    events_rx: mpsc::UnboundedReceiver<ControlEvent>,
    notify_tx: mpsc::UnboundedSender<ConversationEvent>,
    snapshot_tx: watch::Sender<ConversationSnapshot>,
}

impl ConversationController {
    /// Build the controller. Starts in `Idle` when the microphone permission
    /// is already granted, otherwise in `AwaitingPermission`.
    ///
    /// Returns the controller and a receiver of [`ConversationEvent`]s.
    pub fn new(
        deps: ConversationDeps,
        config: ConversationConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ConversationEvent>) {
        let log = MessageLog::seeded(&deps.chat.history());
        let state = if deps.permission.is_granted() {
            ConversationState::Idle
        } else {
            ConversationState::AwaitingPermission
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) =
            watch::channel(ConversationSnapshot::initial(state, log.snapshot()));

        let input = SpeechInputSession::new(
            deps.recognizer,
            Arc::clone(&deps.permission),
            config.recognition,
        );
        let output = SpeechOutputSession::new(deps.synthesizer, deps.player, config.output);

        let controller = Self {
            state,
            log,
            chat: deps.chat,
            permission: deps.permission,
            input,
            output,
            ducking: AudioDuckingGuard::new(deps.mixer),
            speak_deferred_replies: config.speak_deferred_replies,
            sessions: SessionCounter::default(),
            capture: None,
            playback: None,
            in_flight: None,
            permission_task: None,
            deferred_reply: None,
            recognition_unavailable: false,
            transcript: String::new(),
            last_error: None,
            events_tx,
            events_rx,
            notify_tx,
            snapshot_tx,
        };
        (controller, notify_rx)
    }

    /// A cloneable handle for issuing commands and reading snapshots.
    #[must_use]
    pub fn handle(&self) -> ConversationHandle {
        ConversationHandle::new(self.events_tx.clone(), self.snapshot_tx.subscribe())
    }

    #[must_use]
    pub const fn state(&self) -> ConversationState {
        self.state
    }

    #[must_use]
    pub const fn log(&self) -> &MessageLog {
        &self.log
    }

    /// The ducking guard shared by all sessions of this loop.
    #[must_use]
    pub const fn ducking(&self) -> &AudioDuckingGuard {
        &self.ducking
    }

    /// Reply held back while paused, if any.
    #[must_use]
    pub fn deferred_reply(&self) -> Option<&str> {
        self.deferred_reply.as_deref()
    }

    /// Id of the running capture session, if any.
    #[must_use]
    pub fn capture_session(&self) -> Option<SessionId> {
        self.capture.as_ref().map(|c| c.session.id())
    }

    /// Id of the running playback session, if any.
    #[must_use]
    pub fn playback_session(&self) -> Option<SessionId> {
        self.playback.as_ref().map(|p| p.session.id())
    }

    #[must_use]
    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            state: self.state,
            messages: self.log.snapshot(),
            transcript: self.transcript.clone(),
            last_error: self.last_error.clone(),
        }
    }

    /// Process events until the loop exits, then release everything.
    pub async fn run(mut self) {
        tracing::info!(state = %self.state, "Conversation loop started");
        while self.state != ConversationState::Exiting {
            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            self.handle_event(event).await;
        }
        self.exit().await;
        tracing::info!("Conversation loop stopped");
    }

    /// Wait for the next queued event and handle it.
    ///
    /// Returns `false` once the loop has exited.
    pub async fn step(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.handle_event(event).await;
                self.state != ConversationState::Exiting
            }
            None => false,
        }
    }

    /// Apply one event to the state machine.
    pub async fn handle_event(&mut self, event: ControlEvent) {
        if self.state == ConversationState::Exiting {
            tracing::debug!(?event, "Ignoring event after exit");
            return;
        }

        match event {
            ControlEvent::Command(command) => self.on_command(command).await,
            ControlEvent::PermissionResolved { granted } => self.on_permission(granted).await,
            ControlEvent::Capture { session, event } => self.on_capture(session, event).await,
            ControlEvent::Reply { turn, result } => self.on_reply(turn, result).await,
            ControlEvent::Playback { session, event } => self.on_playback(session, event).await,
        }
    }

    // ── Event handlers ─────────────────────────────────────────────

    async fn on_command(&mut self, command: UserCommand) {
        use ConversationState as S;

        match (self.state, command) {
            (_, UserCommand::Shutdown) => self.exit().await,
            (S::AwaitingPermission, UserCommand::Start | UserCommand::RetryPermission) => {
                self.request_permission();
            }
            (S::Idle | S::Paused, UserCommand::RetryPermission) => {
                self.drop_deferred_reply();
                self.set_state(S::AwaitingPermission);
                self.request_permission();
            }
            (S::Idle, UserCommand::Start) => self.enter_listening().await,
            (S::Paused, UserCommand::Resume | UserCommand::TogglePause) => self.resume().await,
            (
                S::Idle | S::Listening | S::Recognizing | S::AwaitingReply | S::Speaking,
                UserCommand::Pause | UserCommand::TogglePause,
            ) => self.pause().await,
            (state @ (S::Idle | S::Listening | S::Paused), UserCommand::SendText(text)) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    tracing::debug!("Ignoring blank text message");
                    return;
                }
                if state == S::Paused {
                    self.submit(text);
                    self.publish();
                } else {
                    self.recognize(text).await;
                }
            }
            (state, command) => {
                tracing::debug!(%state, ?command, "Command has no effect in this state");
            }
        }
    }

    async fn on_permission(&mut self, granted: bool) {
        if self.state != ConversationState::AwaitingPermission {
            tracing::debug!(state = %self.state, granted, "Stale permission answer");
            return;
        }
        self.permission_task = None;

        if granted {
            tracing::info!("Microphone permission granted");
            self.enter_listening().await;
        } else {
            tracing::warn!("Microphone permission denied");
            self.report_error(VoiceError::PermissionDenied.to_string());
            self.exit().await;
        }
    }

    async fn on_capture(&mut self, session: SessionId, event: CaptureEvent) {
        if self.capture_session() != Some(session) || self.state != ConversationState::Listening
        {
            tracing::debug!(%session, state = %self.state, "Ignoring event from inactive capture");
            return;
        }

        match event {
            CaptureEvent::Partial(text) => {
                self.transcript.clone_from(&text);
                self.notify(ConversationEvent::Transcript {
                    text,
                    is_final: false,
                });
                self.publish();
            }
            CaptureEvent::Final(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    tracing::debug!(%session, "Empty transcript, listening again");
                    self.enter_listening().await;
                    return;
                }
                self.transcript.clone_from(&text);
                self.notify(ConversationEvent::Transcript {
                    text: text.clone(),
                    is_final: true,
                });
                self.recognize(text).await;
            }
            CaptureEvent::Error(e) if e.is_recoverable() => {
                tracing::debug!(%session, error = %e, "Nothing heard, listening again");
                self.enter_listening().await;
            }
            CaptureEvent::Error(e) => {
                tracing::warn!(%session, error = %e, "Speech recognition failed");
                self.release_capture().await;
                let message = match e {
                    RecognitionError::Fatal(message) => message,
                    other => other.to_string(),
                };
                self.append(message.clone(), Speaker::Error);
                self.report_error(message);
                self.set_state(ConversationState::Paused);
            }
        }
    }

    async fn on_reply(&mut self, turn: MessageId, result: Result<String, ChatError>) {
        match self.in_flight.take() {
            Some(in_flight) if in_flight.turn == turn => {}
            other => {
                self.in_flight = other;
                tracing::debug!(%turn, "Ignoring reply for an unknown turn");
                return;
            }
        }

        let outcome = record_reply(&mut self.log, turn, result);
        match &outcome {
            ReplyOutcome::Reply(message) => {
                self.notify(ConversationEvent::MessageAppended(message.clone()));
            }
            ReplyOutcome::Failed(message) => {
                self.notify(ConversationEvent::MessageAppended(message.clone()));
                self.report_error(message.text.clone());
            }
            ReplyOutcome::Empty => tracing::debug!(%turn, "Model returned an empty reply"),
        }
        let reply = outcome.reply_text().map(str::to_string);

        match self.state {
            ConversationState::AwaitingReply => match reply {
                Some(text) => self.enter_speaking(text).await,
                None => self.enter_listening().await,
            },
            ConversationState::Paused => {
                if self.speak_deferred_replies {
                    if let Some(text) = reply {
                        tracing::debug!(%turn, "Holding reply until resume");
                        self.deferred_reply = Some(text);
                    }
                }
                self.publish();
            }
            state => {
                tracing::debug!(%state, "Reply recorded without a state change");
                self.publish();
            }
        }
    }

    async fn on_playback(&mut self, session: SessionId, event: PlaybackEvent) {
        if self.playback_session() != Some(session) || self.state != ConversationState::Speaking {
            tracing::debug!(%session, state = %self.state, "Ignoring event from inactive playback");
            return;
        }

        match event {
            PlaybackEvent::Finished => tracing::debug!(%session, "Reply spoken"),
            PlaybackEvent::Failed(e) => {
                tracing::warn!(%session, error = %e, "Could not speak reply");
            }
        }
        self.release_playback().await;
        self.enter_listening().await;
    }

    // ── Transitions ────────────────────────────────────────────────

    async fn enter_listening(&mut self) {
        self.release_capture().await;

        if self.recognition_unavailable {
            tracing::debug!("Recognizer unavailable, staying paused");
            self.report_error(VoiceError::RecognitionUnavailable.to_string());
            self.set_state(ConversationState::Paused);
            self.publish();
            return;
        }

        let lease = self.ducking.acquire();
        let session = self.sessions.issue();
        match self.input.start(session, self.events_tx.clone()).await {
            Ok(capture) => {
                self.capture = Some(ActiveCapture {
                    session: capture,
                    lease,
                });
                self.transcript.clear();
                self.set_state(ConversationState::Listening);
                self.publish();
            }
            Err(e) => {
                lease.release();
                tracing::warn!(%session, error = %e, "Could not start listening");
                self.report_error(e.to_string());
                match e {
                    VoiceError::PermissionDenied => self.exit().await,
                    VoiceError::RecognitionUnavailable => {
                        self.recognition_unavailable = true;
                        self.set_state(ConversationState::Paused);
                        self.publish();
                    }
                    _ => {
                        self.set_state(ConversationState::Paused);
                        self.publish();
                    }
                }
            }
        }
    }

    /// Accept `text` as the user's turn and hand it to the model.
    async fn recognize(&mut self, text: String) {
        self.set_state(ConversationState::Recognizing);
        self.release_capture().await;
        self.submit(text);
        self.set_state(ConversationState::AwaitingReply);
    }

    /// Append the pending user message and send it.
    fn submit(&mut self, text: String) {
        if let Some(previous) = self.in_flight.take() {
            tracing::warn!(turn = %previous.turn, "Abandoning unanswered request");
            previous.task.abort();
        }
        self.drop_deferred_reply();

        let message = self.append(text.clone(), Speaker::User);
        let turn = message.id;
        let chat = Arc::clone(&self.chat);
        let events = self.events_tx.clone();
        let task = tokio::spawn(async move {
            let result = chat.send(&text).await;
            let _ = events.send(ControlEvent::Reply { turn, result });
        });
        self.in_flight = Some(InFlightReply { turn, task });
    }

    async fn enter_speaking(&mut self, text: String) {
        self.release_playback().await;

        let lease = self.ducking.acquire();
        let session = self.sessions.issue();
        let playback = self
            .output
            .synthesize_and_play(session, &text, self.events_tx.clone());
        self.playback = Some(ActivePlayback {
            session: playback,
            lease,
        });
        self.set_state(ConversationState::Speaking);
    }

    async fn pause(&mut self) {
        self.release_capture().await;
        self.release_playback().await;
        self.set_state(ConversationState::Paused);
    }

    async fn resume(&mut self) {
        self.last_error = None;
        if self.in_flight.is_some() {
            self.set_state(ConversationState::AwaitingReply);
            return;
        }
        match self.deferred_reply.take() {
            Some(text) => self.enter_speaking(text).await,
            None => self.enter_listening().await,
        }
    }

    async fn exit(&mut self) {
        self.release_capture().await;
        self.release_playback().await;
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }
        if let Some(task) = self.permission_task.take() {
            task.abort();
        }
        self.deferred_reply = None;
        self.set_state(ConversationState::Exiting);
    }

    fn drop_deferred_reply(&mut self) {
        if self.deferred_reply.take().is_some() {
            tracing::debug!("Dropping reply held while paused");
        }
    }

    fn request_permission(&mut self) {
        if self.permission_task.is_some() {
            tracing::debug!("Permission request already outstanding");
            return;
        }
        let permission = Arc::clone(&self.permission);
        let events = self.events_tx.clone();
        self.permission_task = Some(tokio::spawn(async move {
            let granted = permission.request().await;
            let _ = events.send(ControlEvent::PermissionResolved { granted });
        }));
    }

    // ── Resource release ───────────────────────────────────────────

    async fn release_capture(&mut self) {
        if let Some(active) = self.capture.take() {
            active.session.stop().await;
            active.lease.release();
        }
    }

    async fn release_playback(&mut self) {
        if let Some(active) = self.playback.take() {
            active.session.stop().await;
            active.lease.release();
        }
    }

    // ── Observers ──────────────────────────────────────────────────

    fn set_state(&mut self, next: ConversationState) {
        if self.state == next {
            return;
        }
        let from = self.state;
        self.state = next;
        tracing::debug!(%from, to = %next, "Conversation state changed");
        self.notify(ConversationEvent::StateChanged { from, to: next });
        self.publish();
    }

    fn append(&mut self, text: String, speaker: Speaker) -> palaver_core::Message {
        let pending = speaker == Speaker::User;
        let message = self.log.append(text, speaker, pending);
        self.notify(ConversationEvent::MessageAppended(message.clone()));
        message
    }

    fn report_error(&mut self, message: String) {
        self.last_error = Some(message.clone());
        self.notify(ConversationEvent::Error(message));
    }

    fn notify(&self, event: ConversationEvent) {
        let _ = self.notify_tx.send(event);
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

impl Drop for ConversationController {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }
        if let Some(task) = self.permission_task.take() {
            task.abort();
        }
    }
}
