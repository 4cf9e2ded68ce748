//! CLI command definitions.

use clap::Subcommand;

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Talk hands-free: listen, ask Gemini, speak the reply, listen again
    ///
    /// Speech input is simulated on the console: type what you would say and
    /// press Enter. An empty line counts as "nothing recognized". Lines that
    /// start with `/` are commands (/pause, /resume, /retry, /quit).
    Voice {
        /// Treat the microphone permission as already granted
        #[arg(long)]
        grant_mic: bool,
        /// Seconds of silence before a listening pass times out
        #[arg(long, default_value_t = 30)]
        listen_timeout: u64,
        /// Synthesizer voice for this session (overrides settings)
        #[arg(long)]
        voice: Option<String>,
    },
    /// Text chat with Gemini
    Chat,
    /// Ask a single question and print the reply
    Ask {
        /// The question to send
        question: String,
    },
    /// View or change persisted settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Show resolved data paths
    Paths,
}

/// Settings subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show all current settings
    Show,
    /// Update settings
    Set {
        /// Gemini model name
        #[arg(long)]
        model: Option<String>,
        /// Sampling temperature (0.0-2.0)
        #[arg(long)]
        temperature: Option<f32>,
        /// Top-k sampling
        #[arg(long)]
        top_k: Option<u32>,
        /// Nucleus sampling (0.0-1.0]
        #[arg(long)]
        top_p: Option<f32>,
        /// Maximum reply length in tokens
        #[arg(long)]
        max_output_tokens: Option<u32>,
        /// Synthesizer voice id
        #[arg(long)]
        voice: Option<String>,
        /// Recognition language tag, e.g. en-US
        #[arg(long)]
        language: Option<String>,
        /// Speak replies that arrived while paused once resumed
        #[arg(long)]
        speak_deferred_replies: Option<bool>,
        /// System instruction sent with every request (empty string clears it)
        #[arg(long)]
        system_instruction: Option<String>,
    },
    /// Reset all settings to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}
