//! Gemini adapter for the palaver [`ChatSession`](palaver_core::ChatSession) port.
//!
//! [`GeminiChat`] keeps the conversation history and sends it with every
//! `generateContent` request together with the configured generation
//! parameters, safety settings and system instruction.

#![deny(unsafe_code)]

mod client;
mod config;
mod error;
mod models;

pub use client::GeminiChat;
pub use config::GeminiConfig;
pub use error::GeminiError;
