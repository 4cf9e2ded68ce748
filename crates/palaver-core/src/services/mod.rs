//! Services that orchestrate domain types over ports.

pub mod conversation;

pub use conversation::{ConversationService, ReplyOutcome, record_reply};
