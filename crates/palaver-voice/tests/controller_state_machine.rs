//! Integration tests for the `ConversationController` state machine.
//!
//! The controller is driven through its transitions with in-memory fakes for
//! the recognizer, permission prompt, synthesizer, player and chat session.
//! No audio hardware, speech engine or network access is required.
//!
//! Recognizer events are injected through the `RecognitionSink` the fake
//! recognizer captured; each test then calls `step` to let the controller
//! handle the next queued event.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use palaver_core::{ChatError, ChatSession, ChatTurn, MessageId, Settings, Speaker};
use palaver_voice::backend::{
    AudioPlayer, LanguageModel, MicrophonePermission, PlaybackDoneCallback, PlaybackHandle,
    RecognitionHandle, RecognitionRequest, Recognizer, Synthesizer,
};
use palaver_voice::input::RecognitionSink;
use palaver_voice::ducking::DUCKED_STREAMS;
use palaver_voice::{
    AudioStream, CaptureEvent, ControlEvent, ConversationConfig, ConversationController,
    ConversationDeps, ConversationEvent, ConversationState, PlaybackEvent, RecognitionError,
    SessionId, SoftwareMixer, StreamMixer, UserCommand, VoiceError,
};
use tokio::sync::mpsc::UnboundedReceiver;

// ── Fakes ──────────────────────────────────────────────────────────

/// Chat session answering from a script, one entry per send.
#[derive(Default)]
struct ScriptedChat {
    replies: Mutex<VecDeque<Result<String, ChatError>>>,
    sent: Mutex<Vec<String>>,
}

impl ScriptedChat {
    fn replying(replies: &[Result<&str, &str>]) -> Arc<Self> {
        let replies = replies
            .iter()
            .map(|r| r.map(str::to_string).map_err(ChatError::remote))
            .collect();
        Arc::new(Self {
            replies: Mutex::new(replies),
            sent: Mutex::default(),
        })
    }
}

#[async_trait]
impl ChatSession for ScriptedChat {
    async fn send(&self, text: &str) -> Result<String, ChatError> {
        self.sent.lock().unwrap().push(text.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ChatError::remote("script exhausted")))
    }

    fn history(&self) -> Vec<ChatTurn> {
        ChatTurn::default_seed()
    }
}

#[derive(Default)]
struct FakeRecognizer {
    unavailable: bool,
    denies_microphone: bool,
    probes: AtomicUsize,
    requests: Mutex<Vec<RecognitionRequest>>,
    sinks: Mutex<Vec<RecognitionSink>>,
    stops: Arc<AtomicUsize>,
}

impl FakeRecognizer {
    fn starts(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Sink of the most recent pass.
    fn sink(&self) -> RecognitionSink {
        self.sinks.lock().unwrap().last().cloned().expect("no capture started")
    }
}

struct FakeCapture(Arc<AtomicUsize>);

#[async_trait]
impl RecognitionHandle for FakeCapture {
    async fn stop(self: Box<Self>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Recognizer for FakeRecognizer {
    fn is_available(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        !self.unavailable
    }

    async fn start(
        &self,
        request: RecognitionRequest,
        sink: RecognitionSink,
    ) -> Result<Box<dyn RecognitionHandle>, VoiceError> {
        if self.denies_microphone {
            return Err(VoiceError::PermissionDenied);
        }
        self.requests.lock().unwrap().push(request);
        self.sinks.lock().unwrap().push(sink);
        Ok(Box::new(FakeCapture(Arc::clone(&self.stops))))
    }
}

struct FakePermission {
    granted: AtomicBool,
    answer: bool,
}

#[async_trait]
impl MicrophonePermission for FakePermission {
    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    async fn request(&self) -> bool {
        self.granted.store(self.answer, Ordering::SeqCst);
        self.answer
    }
}

#[derive(Default)]
struct FakeSynth {
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl Synthesizer for FakeSynth {
    fn has_voice(&self, _voice_id: &str) -> bool {
        true
    }

    async fn synthesize_to_file(
        &self,
        text: &str,
        _voice_id: &str,
        output: &Path,
    ) -> Result<(), VoiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(VoiceError::SynthesisError("engine crashed".into()));
        }
        tokio::fs::write(output, text).await?;
        Ok(())
    }
}

/// Player that finishes at once, holds playback until stopped, or fails.
#[derive(Default)]
struct FakePlayer {
    hold: bool,
    fail: bool,
    played: Mutex<Vec<String>>,
    stops: Arc<AtomicUsize>,
}

struct FakePlayback(Arc<AtomicUsize>);

impl PlaybackHandle for FakePlayback {
    fn stop(self: Box<Self>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl AudioPlayer for FakePlayer {
    fn play(
        &self,
        path: &Path,
        on_done: PlaybackDoneCallback,
    ) -> Result<Box<dyn PlaybackHandle>, VoiceError> {
        if self.fail {
            return Err(VoiceError::PlaybackError("no output device".into()));
        }
        self.played
            .lock()
            .unwrap()
            .push(std::fs::read_to_string(path)?);
        if self.hold {
            std::mem::forget(on_done);
        } else {
            on_done();
        }
        Ok(Box::new(FakePlayback(Arc::clone(&self.stops))))
    }
}

// ── Harness ────────────────────────────────────────────────────────

struct Harness {
    controller: ConversationController,
    events: UnboundedReceiver<ConversationEvent>,
    chat: Arc<ScriptedChat>,
    recognizer: Arc<FakeRecognizer>,
    synth: Arc<FakeSynth>,
    player: Arc<FakePlayer>,
    mixer: Arc<SoftwareMixer>,
    _dir: tempfile::TempDir,
}

struct Setup {
    chat: Arc<ScriptedChat>,
    recognizer: FakeRecognizer,
    synth: FakeSynth,
    player: FakePlayer,
    granted: bool,
    answer: bool,
    speak_deferred_replies: bool,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            chat: ScriptedChat::replying(&[]),
            recognizer: FakeRecognizer::default(),
            synth: FakeSynth::default(),
            player: FakePlayer::default(),
            granted: true,
            answer: true,
            speak_deferred_replies: true,
        }
    }
}

impl Setup {
    fn build(self) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let recognizer = Arc::new(self.recognizer);
        let synth = Arc::new(self.synth);
        let player = Arc::new(self.player);
        let mixer = Arc::new(SoftwareMixer::new());
        let deps = ConversationDeps {
            chat: self.chat.clone(),
            recognizer: recognizer.clone(),
            permission: Arc::new(FakePermission {
                granted: AtomicBool::new(self.granted),
                answer: self.answer,
            }),
            synthesizer: synth.clone(),
            player: player.clone(),
            mixer: mixer.clone(),
        };
        let settings = Settings {
            speak_deferred_replies: self.speak_deferred_replies,
            ..Settings::default()
        };
        let config = ConversationConfig::from_settings(&settings, dir.path().to_path_buf());
        let (controller, events) = ConversationController::new(deps, config);
        Harness {
            controller,
            events,
            chat: self.chat,
            recognizer,
            synth,
            player,
            mixer,
            _dir: dir,
        }
    }
}

impl Harness {
    /// Handle the next queued event, failing the test if none arrives.
    async fn step(&mut self) {
        tokio::time::timeout(Duration::from_secs(5), self.controller.step())
            .await
            .expect("controller received no event");
    }

    async fn command(&mut self, command: UserCommand) {
        self.controller.handle_event(command.into()).await;
    }

    fn state(&self) -> ConversationState {
        self.controller.state()
    }

    fn ducking_depth(&self) -> usize {
        self.controller.ducking().depth()
    }

    fn muted_streams(&self) -> Vec<AudioStream> {
        muted(&self.mixer)
    }

    /// Start the loop and reach `Listening` with permission already granted.
    async fn listening(&mut self) {
        self.command(UserCommand::Start).await;
        assert_eq!(self.state(), ConversationState::Listening);
    }

    /// Speak `text` and let the controller take the final transcript.
    async fn say(&mut self, text: &str) {
        self.recognizer.sink().finish(text);
        self.step().await;
    }

    fn drain_events(&mut self) -> Vec<ConversationEvent> {
        let mut events = Vec::new();
        while let Ok(e) = self.events.try_recv() {
            events.push(e);
        }
        events
    }

    fn states_seen(&mut self) -> Vec<ConversationState> {
        self.drain_events()
            .into_iter()
            .filter_map(|e| match e {
                ConversationEvent::StateChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }
}

fn muted(mixer: &SoftwareMixer) -> Vec<AudioStream> {
    DUCKED_STREAMS
        .into_iter()
        .filter(|&s| mixer.is_muted(s))
        .collect()
}

/// Wait until the reply has reached the player.
async fn wait_until_playing(h: &Harness) {
    while h.player.played.lock().unwrap().is_empty() {
        tokio::task::yield_now().await;
    }
}

// ── Initial state ──────────────────────────────────────────────────

#[tokio::test]
async fn starts_idle_when_permission_already_granted() {
    let h = Setup::default().build();
    assert_eq!(h.state(), ConversationState::Idle);
    assert!(h.controller.log().is_empty(), "blank seed turns are hidden");
    assert_eq!(h.recognizer.starts(), 0);
}

#[tokio::test]
async fn starts_awaiting_permission_when_not_granted() {
    let h = Setup {
        granted: false,
        ..Setup::default()
    }
    .build();
    assert_eq!(h.state(), ConversationState::AwaitingPermission);
}

#[tokio::test]
async fn granted_permission_starts_listening() {
    let mut h = Setup {
        granted: false,
        ..Setup::default()
    }
    .build();

    h.command(UserCommand::Start).await;
    h.step().await;

    assert_eq!(h.state(), ConversationState::Listening);
    assert_eq!(h.recognizer.starts(), 1);
    assert_eq!(h.ducking_depth(), 1);
}

#[tokio::test]
async fn capture_is_started_with_recognition_hints() {
    let mut h = Setup::default().build();
    h.listening().await;

    let requests = h.recognizer.requests.lock().unwrap().clone();
    assert_eq!(
        requests,
        vec![RecognitionRequest {
            language: "en-US".into(),
            language_model: LanguageModel::FreeForm,
            partial_results: true,
            max_results: 1,
            prefer_offline: true,
        }]
    );
}

// ── Scenarios ──────────────────────────────────────────────────────

#[tokio::test]
async fn spoken_turn_is_answered_and_spoken() {
    let mut h = Setup {
        chat: ScriptedChat::replying(&[Ok("hi there")]),
        ..Setup::default()
    }
    .build();
    h.listening().await;
    h.drain_events();

    h.recognizer.sink().partial("hel");
    h.step().await;
    assert_eq!(h.controller.snapshot().transcript, "hel");

    h.say("hello").await;
    assert_eq!(
        h.states_seen(),
        vec![ConversationState::Recognizing, ConversationState::AwaitingReply]
    );
    assert_eq!(h.recognizer.stops(), 1, "capture released before sending");
    assert_eq!(h.ducking_depth(), 0);
    assert!(h.controller.log().pending().is_some());

    h.step().await; // reply
    let messages = h.controller.log().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!((messages[0].text.as_str(), messages[0].speaker), ("hello", Speaker::User));
    assert!(!messages[0].pending);
    assert_eq!((messages[1].text.as_str(), messages[1].speaker), ("hi there", Speaker::Model));
    assert_eq!(h.state(), ConversationState::Speaking);
    assert_eq!(h.ducking_depth(), 1);

    h.step().await; // playback finished
    assert_eq!(h.state(), ConversationState::Listening);
    assert_eq!(*h.player.played.lock().unwrap(), vec!["hi there".to_string()]);
    assert_eq!(h.recognizer.starts(), 2, "capture restarted after speaking");
    assert_eq!(h.ducking_depth(), 1);
    assert_eq!(*h.chat.sent.lock().unwrap(), vec!["hello".to_string()]);
}

#[tokio::test]
async fn remote_error_is_recorded_and_listening_resumes() {
    let mut h = Setup {
        chat: ScriptedChat::replying(&[Err("network down")]),
        ..Setup::default()
    }
    .build();
    h.listening().await;

    h.say("hello").await;
    h.step().await;

    let messages = h.controller.log().messages();
    assert_eq!(messages.len(), 2);
    assert!(!messages[0].pending);
    assert_eq!(messages[1].speaker, Speaker::Error);
    assert_eq!(messages[1].text, "network down");
    assert_eq!(h.state(), ConversationState::Listening);
    assert!(!h.states_seen().contains(&ConversationState::Speaking));
    assert_eq!(h.synth.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.controller.snapshot().last_error.as_deref(),
        Some("network down")
    );
}

#[tokio::test]
async fn repeated_timeouts_keep_listening_silently() {
    let mut h = Setup::default().build();
    h.listening().await;
    h.drain_events();

    for _ in 0..3 {
        h.recognizer.sink().fail(RecognitionError::Timeout);
        h.step().await;
        assert_eq!(h.state(), ConversationState::Listening);
    }

    assert!(h.controller.log().is_empty());
    assert_eq!(h.controller.snapshot().last_error, None);
    assert!(
        !h.drain_events()
            .iter()
            .any(|e| matches!(e, ConversationEvent::Error(_)))
    );
    assert_eq!(h.recognizer.starts(), 4);
    assert_eq!(h.recognizer.stops(), 3);
    assert_eq!(h.ducking_depth(), 1, "one lease per live capture");
}

#[tokio::test]
async fn pause_while_speaking_stops_playback_and_resume_listens() {
    let mut h = Setup {
        chat: ScriptedChat::replying(&[Ok("a long answer")]),
        player: FakePlayer {
            hold: true,
            ..FakePlayer::default()
        },
        ..Setup::default()
    }
    .build();
    h.listening().await;
    h.say("tell me a story").await;
    h.step().await;
    assert_eq!(h.state(), ConversationState::Speaking);

    wait_until_playing(&h).await;
    h.command(UserCommand::Pause).await;

    assert_eq!(h.state(), ConversationState::Paused);
    assert_eq!(h.player.stops.load(Ordering::SeqCst), 1);
    assert_eq!(h.controller.playback_session(), None);
    assert_eq!(h.ducking_depth(), 0);

    h.command(UserCommand::Resume).await;
    assert_eq!(h.state(), ConversationState::Listening);
    assert_eq!(h.recognizer.starts(), 2);
    assert_eq!(h.ducking_depth(), 1);
}

#[tokio::test]
async fn denied_permission_exits_without_sessions() {
    let mut h = Setup {
        granted: false,
        answer: false,
        ..Setup::default()
    }
    .build();

    h.command(UserCommand::Start).await;
    h.step().await;

    assert_eq!(h.state(), ConversationState::Exiting);
    assert_eq!(h.recognizer.starts(), 0);
    assert_eq!(h.synth.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.ducking_depth(), 0);
    assert_eq!(
        h.controller.snapshot().last_error.as_deref(),
        Some("Microphone permission denied")
    );
}

// ── Guards and no-ops ──────────────────────────────────────────────

#[tokio::test]
async fn stale_capture_events_are_ignored() {
    let mut h = Setup::default().build();
    h.listening().await;
    let first = h.controller.capture_session().unwrap();

    h.recognizer.sink().fail(RecognitionError::NoMatch);
    h.step().await;
    assert_ne!(h.controller.capture_session(), Some(first));

    h.controller
        .handle_event(ControlEvent::Capture {
            session: first,
            event: CaptureEvent::Final("ghost".into()),
        })
        .await;

    assert_eq!(h.state(), ConversationState::Listening);
    assert!(h.controller.log().is_empty());
}

#[tokio::test]
async fn stale_playback_events_are_ignored() {
    let mut h = Setup {
        chat: ScriptedChat::replying(&[Ok("answer")]),
        player: FakePlayer {
            hold: true,
            ..FakePlayer::default()
        },
        ..Setup::default()
    }
    .build();
    h.listening().await;
    h.say("question").await;
    h.step().await;
    let live = h.controller.playback_session().unwrap();

    h.controller
        .handle_event(ControlEvent::Playback {
            session: SessionId::new(live.get() + 100),
            event: PlaybackEvent::Finished,
        })
        .await;

    assert_eq!(h.state(), ConversationState::Speaking);
    assert_eq!(h.controller.playback_session(), Some(live));
}

#[tokio::test]
async fn unlisted_events_change_nothing() {
    let mut h = Setup {
        granted: false,
        ..Setup::default()
    }
    .build();
    h.command(UserCommand::Pause).await;
    h.command(UserCommand::Resume).await;
    assert_eq!(h.state(), ConversationState::AwaitingPermission);

    let mut h = Setup::default().build();
    h.listening().await;
    h.drain_events();

    h.command(UserCommand::Resume).await;
    h.controller
        .handle_event(ControlEvent::Reply {
            turn: MessageId::new(),
            result: Ok("unsolicited".into()),
        })
        .await;
    h.controller
        .handle_event(ControlEvent::PermissionResolved { granted: false })
        .await;

    assert_eq!(h.state(), ConversationState::Listening);
    assert!(h.controller.log().is_empty());
    assert!(h.drain_events().is_empty());
    assert_eq!(h.recognizer.starts(), 1);
}

#[tokio::test]
async fn late_partial_after_final_is_dropped() {
    let mut h = Setup {
        chat: ScriptedChat::replying(&[Ok("ok")]),
        ..Setup::default()
    }
    .build();
    h.listening().await;
    let sink = h.recognizer.sink();

    sink.finish("hello");
    sink.partial("hello again");
    h.step().await;

    assert_eq!(h.state(), ConversationState::AwaitingReply);
    assert_eq!(h.controller.snapshot().transcript, "hello");
}

// ── Pausing around replies ─────────────────────────────────────────

#[tokio::test]
async fn reply_arriving_while_paused_is_spoken_on_resume() {
    let mut h = Setup {
        chat: ScriptedChat::replying(&[Ok("deferred answer")]),
        ..Setup::default()
    }
    .build();
    h.listening().await;
    h.say("hello").await;
    h.command(UserCommand::Pause).await;
    assert_eq!(h.state(), ConversationState::Paused);

    h.step().await; // reply while paused
    assert_eq!(h.state(), ConversationState::Paused);
    assert_eq!(h.controller.deferred_reply(), Some("deferred answer"));
    assert_eq!(h.controller.log().len(), 2, "reply is recorded while paused");
    assert_eq!(h.synth.calls.load(Ordering::SeqCst), 0);

    h.command(UserCommand::Resume).await;
    assert_eq!(h.state(), ConversationState::Speaking);
    assert_eq!(h.controller.deferred_reply(), None);

    h.step().await;
    assert_eq!(h.state(), ConversationState::Listening);
    assert_eq!(
        *h.player.played.lock().unwrap(),
        vec!["deferred answer".to_string()]
    );
}

#[tokio::test]
async fn retry_permission_drops_reply_held_while_paused() {
    let mut h = Setup {
        chat: ScriptedChat::replying(&[Ok("old answer")]),
        ..Setup::default()
    }
    .build();
    h.listening().await;
    h.say("hello").await;
    h.command(UserCommand::Pause).await;
    h.step().await;
    assert_eq!(h.controller.deferred_reply(), Some("old answer"));

    h.command(UserCommand::RetryPermission).await;
    assert_eq!(h.controller.deferred_reply(), None);
    h.step().await; // granted
    assert_eq!(h.state(), ConversationState::Listening);

    h.command(UserCommand::Pause).await;
    h.command(UserCommand::Resume).await;
    assert_eq!(h.state(), ConversationState::Listening);
    assert_eq!(h.synth.calls.load(Ordering::SeqCst), 0);
    assert!(h.player.played.lock().unwrap().is_empty());
}

#[tokio::test]
async fn new_text_while_paused_replaces_held_reply() {
    let mut h = Setup {
        chat: ScriptedChat::replying(&[Ok("first answer"), Ok("   ")]),
        ..Setup::default()
    }
    .build();
    h.listening().await;
    h.say("first").await;
    h.command(UserCommand::Pause).await;
    h.step().await;
    assert_eq!(h.controller.deferred_reply(), Some("first answer"));

    h.command(UserCommand::SendText("second".into())).await;
    assert_eq!(h.controller.deferred_reply(), None);
    h.step().await; // blank reply

    h.command(UserCommand::Resume).await;
    assert_eq!(h.state(), ConversationState::Listening);
    assert_eq!(h.synth.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn deferred_speech_can_be_disabled() {
    let mut h = Setup {
        chat: ScriptedChat::replying(&[Ok("answer")]),
        speak_deferred_replies: false,
        ..Setup::default()
    }
    .build();
    h.listening().await;
    h.say("hello").await;
    h.command(UserCommand::Pause).await;
    h.step().await;

    assert_eq!(h.controller.deferred_reply(), None);
    h.command(UserCommand::TogglePause).await;
    assert_eq!(h.state(), ConversationState::Listening);
    assert_eq!(h.synth.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn resume_before_reply_waits_for_it() {
    let mut h = Setup {
        chat: ScriptedChat::replying(&[Ok("answer")]),
        ..Setup::default()
    }
    .build();
    h.listening().await;
    h.say("hello").await;
    h.command(UserCommand::Pause).await;
    h.command(UserCommand::Resume).await;

    assert_eq!(h.state(), ConversationState::AwaitingReply);
    h.step().await;
    assert_eq!(h.state(), ConversationState::Speaking);
}

#[tokio::test]
async fn text_sent_while_paused_stays_paused() {
    let mut h = Setup {
        chat: ScriptedChat::replying(&[Ok("typed answer")]),
        ..Setup::default()
    }
    .build();
    h.listening().await;
    h.command(UserCommand::Pause).await;

    h.command(UserCommand::SendText("typed question".into())).await;
    assert_eq!(h.state(), ConversationState::Paused);
    assert!(h.controller.log().pending().is_some());

    h.step().await;
    assert_eq!(h.state(), ConversationState::Paused);
    assert!(h.controller.log().pending().is_none());
    assert_eq!(h.controller.deferred_reply(), Some("typed answer"));
}

#[tokio::test]
async fn text_sent_while_listening_follows_spoken_path() {
    let mut h = Setup {
        chat: ScriptedChat::replying(&[Ok("typed answer")]),
        ..Setup::default()
    }
    .build();
    h.listening().await;

    h.command(UserCommand::SendText("  typed question ".into())).await;
    assert_eq!(h.state(), ConversationState::AwaitingReply);
    assert_eq!(h.recognizer.stops(), 1);

    h.step().await;
    assert_eq!(h.state(), ConversationState::Speaking);
    assert_eq!(*h.chat.sent.lock().unwrap(), vec!["typed question".to_string()]);
}

// ── Failures ───────────────────────────────────────────────────────

#[tokio::test]
async fn fatal_recognition_error_pauses_with_message() {
    let mut h = Setup::default().build();
    h.listening().await;

    h.recognizer
        .sink()
        .fail(RecognitionError::Fatal("microphone unplugged".into()));
    h.step().await;

    assert_eq!(h.state(), ConversationState::Paused);
    let last = h.controller.log().last().unwrap();
    assert_eq!(last.speaker, Speaker::Error);
    assert_eq!(last.text, "microphone unplugged");
    assert_eq!(h.ducking_depth(), 0);
}

#[tokio::test]
async fn unavailable_recognizer_pauses_with_visible_error() {
    let mut h = Setup {
        recognizer: FakeRecognizer {
            unavailable: true,
            ..FakeRecognizer::default()
        },
        ..Setup::default()
    }
    .build();

    h.command(UserCommand::Start).await;

    assert_eq!(h.state(), ConversationState::Paused);
    assert_eq!(
        h.controller.snapshot().last_error.as_deref(),
        Some("Speech recognition is not available on this device")
    );
    assert_eq!(h.ducking_depth(), 0, "lease released when capture cannot start");
    assert!(h.controller.log().is_empty());

    let probes = h.recognizer.probes.load(Ordering::SeqCst);
    h.command(UserCommand::Resume).await;
    assert_eq!(h.state(), ConversationState::Paused);
    assert_eq!(h.recognizer.probes.load(Ordering::SeqCst), probes, "no retry");
    assert_eq!(
        h.controller.snapshot().last_error.as_deref(),
        Some("Speech recognition is not available on this device")
    );
}

#[tokio::test]
async fn microphone_denied_at_capture_start_exits() {
    let mut h = Setup {
        recognizer: FakeRecognizer {
            denies_microphone: true,
            ..FakeRecognizer::default()
        },
        ..Setup::default()
    }
    .build();

    h.command(UserCommand::Start).await;

    assert_eq!(h.state(), ConversationState::Exiting);
    assert_eq!(
        h.controller.snapshot().last_error.as_deref(),
        Some("Microphone permission denied")
    );
    assert_eq!(h.ducking_depth(), 0);
    assert!(h.muted_streams().is_empty());
}

#[tokio::test]
async fn synthesis_failure_goes_back_to_listening() {
    let mut h = Setup {
        chat: ScriptedChat::replying(&[Ok("answer")]),
        synth: FakeSynth {
            fail: true,
            ..FakeSynth::default()
        },
        ..Setup::default()
    }
    .build();
    h.listening().await;
    h.say("hello").await;
    h.step().await; // reply
    assert_eq!(h.state(), ConversationState::Speaking);

    h.step().await; // playback failed
    assert_eq!(h.state(), ConversationState::Listening);
    assert_eq!(h.recognizer.starts(), 2);
    assert_eq!(h.ducking_depth(), 1);
    assert!(h.player.played.lock().unwrap().is_empty());
    assert_eq!(h.controller.log().last().unwrap().speaker, Speaker::Model);
}

#[tokio::test]
async fn playback_failure_goes_back_to_listening() {
    let mut h = Setup {
        chat: ScriptedChat::replying(&[Ok("answer")]),
        player: FakePlayer {
            fail: true,
            ..FakePlayer::default()
        },
        ..Setup::default()
    }
    .build();
    h.listening().await;
    h.say("hello").await;
    h.step().await;
    h.step().await;

    assert_eq!(h.state(), ConversationState::Listening);
    assert_eq!(h.synth.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.controller.playback_session(), None);
    assert_eq!(h.ducking_depth(), 1);
}

#[tokio::test]
async fn retry_permission_from_paused_asks_again() {
    let mut h = Setup::default().build();
    h.command(UserCommand::Pause).await;
    assert_eq!(h.state(), ConversationState::Paused);

    h.command(UserCommand::RetryPermission).await;
    assert_eq!(h.state(), ConversationState::AwaitingPermission);
    h.step().await;
    assert_eq!(h.state(), ConversationState::Listening);
}

// ── Teardown ───────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_releases_everything_and_ignores_later_events() {
    let mut h = Setup::default().build();
    h.listening().await;

    h.command(UserCommand::Shutdown).await;

    assert_eq!(h.state(), ConversationState::Exiting);
    assert_eq!(h.recognizer.stops(), 1);
    assert_eq!(h.ducking_depth(), 0);

    h.command(UserCommand::Resume).await;
    h.command(UserCommand::Start).await;
    assert_eq!(h.state(), ConversationState::Exiting);
    assert_eq!(h.recognizer.starts(), 1);
}

#[tokio::test]
async fn shutdown_while_speaking_stops_playback() {
    let mut h = Setup {
        chat: ScriptedChat::replying(&[Ok("a long answer")]),
        player: FakePlayer {
            hold: true,
            ..FakePlayer::default()
        },
        ..Setup::default()
    }
    .build();
    h.listening().await;
    h.say("tell me a story").await;
    h.step().await;
    wait_until_playing(&h).await;
    assert_eq!(h.muted_streams().len(), DUCKED_STREAMS.len());

    h.command(UserCommand::Shutdown).await;

    assert_eq!(h.state(), ConversationState::Exiting);
    assert_eq!(h.player.stops.load(Ordering::SeqCst), 1);
    assert_eq!(h.controller.playback_session(), None);
    assert_eq!(h.ducking_depth(), 0);
    assert!(h.muted_streams().is_empty());
}

#[tokio::test]
async fn dropping_the_controller_restores_streams() {
    let mut h = Setup::default().build();
    h.mixer.set_muted(AudioStream::Media, true).unwrap();
    h.listening().await;
    assert_eq!(h.muted_streams().len(), DUCKED_STREAMS.len());

    let ducking = h.controller.ducking().clone();
    let Harness {
        controller, mixer, ..
    } = h;
    drop(controller);

    assert_eq!(ducking.depth(), 0);
    assert_eq!(muted(&mixer), vec![AudioStream::Media], "prior state restored");
}

#[tokio::test]
async fn run_loop_publishes_snapshots_until_shutdown() {
    let h = Setup::default().build();
    let handle = h.controller.handle();
    let mut snapshots = handle.subscribe();
    let recognizer = Arc::clone(&h.recognizer);

    let task = tokio::spawn(h.controller.run());
    handle.start();

    tokio::time::timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| s.state == ConversationState::Listening),
    )
    .await
    .expect("never started listening")
    .unwrap();

    handle.shutdown();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("loop did not stop")
        .unwrap();

    assert_eq!(handle.snapshot().state, ConversationState::Exiting);
    assert_eq!(recognizer.stops(), 1);
    assert!(handle.is_closed());
}
