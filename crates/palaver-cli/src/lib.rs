//! Command-line front end for palaver.
//!
//! `palaver voice` runs the hands-free conversation loop with console
//! stand-ins for the microphone, `palaver chat` is a plain text REPL over the
//! same chat session, and `palaver config` manages persisted settings.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;
pub mod providers;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::{Commands, ConfigCommand};
pub use error::CliError;
pub use parser::Cli;
