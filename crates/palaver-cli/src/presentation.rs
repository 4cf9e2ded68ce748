//! Terminal rendering of conversation output.

use palaver_core::{ReplyOutcome, Settings, Speaker};
use palaver_voice::{ConversationEvent, ConversationState};

/// One line for a voice loop event, or `None` for events the console
/// already shows (the user's own typed speech, intermediate states).
pub fn render_event(event: &ConversationEvent) -> Option<String> {
    match event {
        ConversationEvent::StateChanged { to, .. } => render_state(*to).map(str::to_string),
        ConversationEvent::MessageAppended(message) => match message.speaker {
            Speaker::Model => Some(format!("gemini> {}", message.text)),
            Speaker::User | Speaker::Error => None,
        },
        ConversationEvent::Error(message) => Some(format!("error> {message}")),
        ConversationEvent::Transcript { .. } => None,
    }
}

const fn render_state(state: ConversationState) -> Option<&'static str> {
    match state {
        ConversationState::Listening => Some("[listening]"),
        ConversationState::AwaitingReply => Some("[thinking]"),
        ConversationState::Speaking => Some("[speaking]"),
        ConversationState::Paused => Some("[paused: /resume to continue]"),
        ConversationState::Exiting => Some("[bye]"),
        ConversationState::AwaitingPermission
        | ConversationState::Idle
        | ConversationState::Recognizing => None,
    }
}

/// Text chat rendering of one reply.
pub fn render_outcome(outcome: &ReplyOutcome) -> String {
    match outcome {
        ReplyOutcome::Reply(message) => format!("gemini> {}", message.text),
        ReplyOutcome::Empty => "gemini> (no reply)".to_string(),
        ReplyOutcome::Failed(message) => format!("error> {}", message.text),
    }
}

/// Pretty JSON view of the settings.
pub fn render_settings(settings: &Settings) -> String {
    serde_json::to_string_pretty(settings).unwrap_or_else(|e| format!("<unprintable: {e}>"))
}

pub const VOICE_HELP: &str = "\
Type what you would say and press Enter (an empty line means nothing was heard).
Commands: /pause  /resume  /p (toggle)  /say <text>  /retry  /quit";

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::MessageLog;

    #[test]
    fn test_model_messages_are_rendered_user_messages_are_not() {
        let mut log = MessageLog::new();
        let user = log.append("hello", Speaker::User, false);
        let model = log.append("hi there", Speaker::Model, false);

        assert_eq!(render_event(&ConversationEvent::MessageAppended(user)), None);
        assert_eq!(
            render_event(&ConversationEvent::MessageAppended(model)).as_deref(),
            Some("gemini> hi there")
        );
    }

    #[test]
    fn test_errors_render_once() {
        let mut log = MessageLog::new();
        let error = log.append("network down", Speaker::Error, false);
        assert_eq!(render_event(&ConversationEvent::MessageAppended(error)), None);
        assert_eq!(
            render_event(&ConversationEvent::Error("network down".into())).as_deref(),
            Some("error> network down")
        );
    }

    #[test]
    fn test_transient_states_are_silent() {
        let event = ConversationEvent::StateChanged {
            from: ConversationState::Listening,
            to: ConversationState::Recognizing,
        };
        assert_eq!(render_event(&event), None);
    }

    #[test]
    fn test_settings_render_as_json() {
        let rendered = render_settings(&Settings::default());
        assert!(rendered.contains("\"voice_id\""));
    }
}
