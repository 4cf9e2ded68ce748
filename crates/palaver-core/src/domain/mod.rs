//! Domain types for the conversation.
//!
//! These types are pure data: no I/O, no channels, no runtime handles.

pub mod chat;
pub mod message;

pub use chat::{ChatRole, ChatTurn};
pub use message::{Message, MessageId, MessageLog, Speaker};
