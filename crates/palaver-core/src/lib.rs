//! Core domain types and port definitions for palaver.
//!
//! This crate holds everything the conversation loop needs that is not tied
//! to a particular speech engine, network client or terminal:
//!
//! - [`domain`] - conversation turns and the [`MessageLog`]
//! - [`ports`] - the [`ChatSession`] boundary towards the remote model
//! - [`settings`] - user-tunable [`Settings`] with validation and persistence
//! - [`services`] - [`ConversationService`] and reply bookkeeping
//! - [`paths`] - data directory resolution

pub mod domain;
pub mod paths;
pub mod ports;
pub mod services;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{ChatRole, ChatTurn, Message, MessageId, MessageLog, Speaker};
pub use paths::{PathError, data_root, ensure_directory};
pub use ports::{ChatError, ChatSession};
pub use services::{ConversationService, ReplyOutcome, record_reply};
pub use settings::{
    DEFAULT_MODEL_NAME, DEFAULT_VOICE_ID, GenerationSettings, SafetyThreshold, Settings,
    SettingsError, validate_settings,
};
