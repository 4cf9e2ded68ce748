//! Command handlers.

pub mod chat;
pub mod config;
pub mod paths;
pub mod voice;
