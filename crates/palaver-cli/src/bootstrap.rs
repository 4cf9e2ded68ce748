//! CLI bootstrap - the composition root.
//!
//! Settings are loaded here and the Gemini chat session is built here. Voice
//! providers are wired in the voice handler since only that command needs them.

use std::path::PathBuf;
use std::sync::Arc;

use palaver_core::paths::{ARTIFACT_DIR_NAME, SETTINGS_FILE_NAME, data_root, ensure_directory};
use palaver_core::{ChatSession, ChatTurn, Settings};
use palaver_gemini::{GeminiChat, GeminiConfig};

use crate::error::CliError;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Root for settings and speech artifacts.
    pub data_dir: PathBuf,
    /// Gemini API key, if one was supplied.
    pub api_key: Option<String>,
}

impl CliConfig {
    /// Resolve the data directory, preferring an explicit override.
    pub fn resolve(data_dir: Option<PathBuf>, api_key: Option<String>) -> Result<Self, CliError> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => data_root()?,
        };
        Ok(Self {
            data_dir,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE_NAME)
    }

    #[must_use]
    pub fn artifact_dir(&self) -> PathBuf {
        self.data_dir.join(ARTIFACT_DIR_NAME)
    }
}

/// Composed context handed to command handlers.
#[derive(Debug)]
pub struct CliContext {
    pub config: CliConfig,
    pub settings: Settings,
}

impl CliContext {
    /// Build a Gemini chat session seeded with the default history.
    pub fn chat(&self) -> Result<Arc<dyn ChatSession>, CliError> {
        let api_key = self.config.api_key.clone().ok_or(CliError::MissingApiKey)?;
        let config = GeminiConfig::from_settings(api_key, &self.settings);
        let chat = GeminiChat::new(config, ChatTurn::default_seed())?;
        tracing::debug!(model = %self.settings.model_name, "Chat session ready");
        Ok(Arc::new(chat))
    }

    /// The speech artifact directory, created on demand.
    pub fn artifact_dir(&self) -> Result<PathBuf, CliError> {
        let dir = self.config.artifact_dir();
        ensure_directory(&dir)?;
        Ok(dir)
    }

    /// Persist `settings` and make them current.
    pub fn save_settings(&mut self, settings: Settings) -> Result<(), CliError> {
        ensure_directory(&self.config.data_dir)?;
        settings.save_to(&self.config.settings_path())?;
        self.settings = settings;
        Ok(())
    }
}

/// Load settings for the resolved configuration.
pub fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    let settings = Settings::load_from(&config.settings_path())?;
    tracing::debug!(data_dir = %config.data_dir.display(), "Settings loaded");
    Ok(CliContext { config, settings })
}
