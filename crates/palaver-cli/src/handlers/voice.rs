//! Voice command handler - the hands-free loop on a terminal.
//!
//! Wires console providers, the external synthesizer and `rodio` playback
//! into a [`ConversationController`], then routes terminal lines either to
//! the open listening pass, the permission prompt or the loop's commands.
//!
//! Ducking runs against an in-process [`SoftwareMixer`]: a terminal has no
//! system stream volumes to lower, so the mute table only tracks what a
//! platform mixer would have been asked to do. Set `RUST_LOG=debug` to see
//! each duck and restore.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use palaver_voice::{
    CommandSynthesizer, ConversationConfig, ConversationController, ConversationDeps,
    ConversationHandle, ConversationState, RodioPlayer, SoftwareMixer, VoiceError,
};
use tokio::sync::mpsc;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{VOICE_HELP, render_event};
use crate::providers::{ConsolePermission, ConsoleRecognizer};

/// Options for `palaver voice`.
#[derive(Debug, Clone)]
pub struct VoiceArgs {
    pub grant_mic: bool,
    pub listen_timeout: Duration,
    pub voice: Option<String>,
}

/// A parsed terminal line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleInput {
    Speech(String),
    Pause,
    Resume,
    TogglePause,
    Retry,
    Say(String),
    Help,
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> ConsoleInput {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return ConsoleInput::Speech(trimmed.to_string());
    };

    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    match name {
        "pause" => ConsoleInput::Pause,
        "resume" => ConsoleInput::Resume,
        "p" | "toggle" => ConsoleInput::TogglePause,
        "retry" => ConsoleInput::Retry,
        "say" => ConsoleInput::Say(rest.trim().to_string()),
        "help" | "?" => ConsoleInput::Help,
        "quit" | "exit" | "q" => ConsoleInput::Quit,
        other => ConsoleInput::Unknown(other.to_string()),
    }
}

/// Run the voice loop until the user quits or the loop exits.
pub async fn execute(ctx: &CliContext, args: VoiceArgs) -> Result<()> {
    let chat = ctx.chat()?;

    let mut settings = ctx.settings.clone();
    if let Some(voice) = args.voice {
        settings.voice_id = voice;
    }

    let synthesizer = CommandSynthesizer::from_template(&settings.synthesizer_command)
        .map_err(CliError::from)?;
    if !synthesizer.is_installed() {
        tracing::warn!(
            command = ?settings.synthesizer_command.first(),
            "Synthesizer not found on PATH; replies will be shown but not spoken"
        );
    }

    let recognizer = Arc::new(ConsoleRecognizer::new(args.listen_timeout));
    let permission = Arc::new(ConsolePermission::new(args.grant_mic));
    let deps = ConversationDeps {
        chat,
        recognizer: recognizer.clone(),
        permission: permission.clone(),
        synthesizer: Arc::new(synthesizer),
        player: Arc::new(RodioPlayer::new()),
        mixer: Arc::new(SoftwareMixer::new()),
    };
    let config = ConversationConfig::from_settings(&settings, ctx.artifact_dir()?);

    let (controller, mut events) = ConversationController::new(deps, config);
    let handle = controller.handle();
    let loop_task = tokio::spawn(controller.run());

    spawn_ctrl_c(handle.clone());
    spawn_input_router(handle.clone(), recognizer, permission);

    println!("{VOICE_HELP}");
    handle.start();

    while let Some(event) = events.recv().await {
        if let Some(line) = render_event(&event) {
            println!("{line}");
        }
    }
    loop_task.await?;

    let last = handle.snapshot();
    if last.state == ConversationState::Exiting
        && last.last_error.as_deref() == Some(VoiceError::PermissionDenied.to_string().as_str())
    {
        return Err(CliError::PermissionDenied.into());
    }
    Ok(())
}

fn spawn_ctrl_c(handle: ConversationHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Ctrl-C received");
            handle.shutdown();
        }
    });
}

fn spawn_input_router(
    handle: ConversationHandle,
    recognizer: Arc<ConsoleRecognizer>,
    permission: Arc<ConsolePermission>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Blocking stdin reader; ends with the process.
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if permission.answer(&line) {
                continue;
            }
            match parse_input(&line) {
                ConsoleInput::Speech(text) => {
                    if !recognizer.feed(&text) && !text.is_empty() {
                        println!("(not listening: /resume to continue or /say <text> to send)");
                    }
                }
                ConsoleInput::Pause => handle.pause(),
                ConsoleInput::Resume => handle.resume(),
                ConsoleInput::TogglePause => handle.toggle_pause(),
                ConsoleInput::Retry => handle.retry_permission(),
                ConsoleInput::Say(text) => handle.send_text(text),
                ConsoleInput::Help => println!("{VOICE_HELP}"),
                ConsoleInput::Quit => {
                    handle.shutdown();
                    return;
                }
                ConsoleInput::Unknown(name) => println!("Unknown command /{name} (try /help)"),
            }
        }
        tracing::debug!("Console input closed");
        handle.shutdown();
    });
}
