//! CLI entry point.
//!
//! Parses arguments, initializes logging, bootstraps the context and
//! dispatches to a handler. Errors become sysexits-style exit codes.

use std::time::Duration;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use palaver_cli::handlers::{self, voice::VoiceArgs};
use palaver_cli::{Cli, CliConfig, CliError, Commands, bootstrap};

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = CliConfig::resolve(cli.data_dir, cli.api_key)?;
    let mut ctx = bootstrap(config)?;

    match command {
        Commands::Voice {
            grant_mic,
            listen_timeout,
            voice,
        } => {
            let args = VoiceArgs {
                grant_mic,
                listen_timeout: Duration::from_secs(listen_timeout),
                voice,
            };
            handlers::voice::execute(&ctx, args).await?;
        }
        Commands::Chat => handlers::chat::execute(&ctx).await?,
        Commands::Ask { question } => handlers::chat::ask(&ctx, &question).await?,
        Commands::Config { command } => handlers::config::execute(&mut ctx, command)?,
        Commands::Paths => handlers::paths::execute(&ctx)?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Load environment variables before clap reads GEMINI_API_KEY
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
        std::process::exit(code);
    }
}
