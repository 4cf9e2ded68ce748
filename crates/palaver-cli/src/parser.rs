//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Talk to Gemini by voice or text.
#[derive(Parser)]
#[command(name = "palaver")]
#[command(about = "Hands-free voice conversation with Gemini")]
#[command(version)]
pub struct Cli {
    /// Gemini API key
    #[arg(long = "api-key", env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Override the data directory (settings and speech artifacts)
    #[arg(long = "data-dir", env = "PALAVER_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ConfigCommand;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from([
            "palaver",
            "--verbose",
            "--data-dir",
            "/tmp/palaver",
            "--api-key",
            "k",
            "config",
            "show",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/palaver")));
        assert_eq!(cli.api_key.as_deref(), Some("k"));
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                command: ConfigCommand::Show
            })
        ));
    }

    #[test]
    fn test_voice_defaults() {
        let cli = Cli::parse_from(["palaver", "voice"]);
        match cli.command {
            Some(Commands::Voice {
                grant_mic,
                listen_timeout,
                voice,
            }) => {
                assert!(!grant_mic);
                assert_eq!(listen_timeout, 30);
                assert_eq!(voice, None);
            }
            _ => panic!("expected voice command"),
        }
    }
}
