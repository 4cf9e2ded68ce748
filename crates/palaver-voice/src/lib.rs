//! Hands-free voice conversation for palaver.
//!
//! The [`ConversationController`] listens, sends what it heard to a
//! [`ChatSession`](palaver_core::ChatSession), speaks the reply and listens
//! again. Speech recognition, synthesis, playback and stream ducking are
//! reached through the traits in [`backend`] and [`ducking`], so the loop
//! itself is platform independent.

#![deny(unsafe_code)]

pub mod backend;
pub mod controller;
pub mod ducking;
pub mod error;
pub mod input;
pub mod output;
pub mod playback;
pub mod session;
pub mod text_utils;

pub use backend::command::CommandSynthesizer;
pub use controller::{
    ConversationConfig, ConversationController, ConversationDeps, ConversationEvent,
    ConversationHandle, ConversationSnapshot, ConversationState,
};
pub use ducking::{AudioDuckingGuard, AudioStream, DuckingLease, SoftwareMixer, StreamMixer};
pub use error::{RecognitionError, VoiceError};
pub use playback::RodioPlayer;
pub use session::{CaptureEvent, ControlEvent, PlaybackEvent, SessionId, UserCommand};
