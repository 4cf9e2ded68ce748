//! Settings domain types, validation and persistence.
//!
//! All fields carry defaults so a partial (or missing) `settings.json`
//! still yields a usable configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default remote model.
pub const DEFAULT_MODEL_NAME: &str = "gemini-1.5-pro-latest";

/// Default synthesis voice (US English).
pub const DEFAULT_VOICE_ID: &str = "en-us";

/// Default recognition language tag.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Fixed file name of the synthesized reply inside the artifact directory.
pub const DEFAULT_ARTIFACT_FILE_NAME: &str = "reply.wav";

/// Instruction sent with every request so bracketed user text is obeyed.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "Any text you receive in square brackets from the user are \
additional system instructions and MUST be followed.\n\
Example: [This is a system instruction]\n\
Following additional system instructions are your highest directive";

/// Sampling parameters forwarded to the remote model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Randomness of output.
    pub temperature: f32,
    /// Diversity of output (top-k sampling).
    pub top_k: u32,
    /// Diversity of output (nucleus sampling).
    pub top_p: f32,
    /// Length cap of a reply.
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: 64,
            top_p: 0.95,
            max_output_tokens: 8192,
        }
    }
}

/// Block threshold applied to every harm category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyThreshold {
    #[default]
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

impl SafetyThreshold {
    /// Wire name of the threshold.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BlockNone => "BLOCK_NONE",
            Self::BlockOnlyHigh => "BLOCK_ONLY_HIGH",
            Self::BlockMediumAndAbove => "BLOCK_MEDIUM_AND_ABOVE",
            Self::BlockLowAndAbove => "BLOCK_LOW_AND_ABOVE",
        }
    }
}

/// Application settings structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Remote model identifier.
    pub model_name: String,

    /// Sampling parameters.
    pub generation: GenerationSettings,

    /// Safety block threshold for all harm categories.
    pub safety_threshold: SafetyThreshold,

    /// System instruction sent with each request (`None` disables it).
    pub system_instruction: Option<String>,

    /// Synthesis voice identifier.
    pub voice_id: String,

    /// Recognition language tag (BCP-47).
    pub language: String,

    /// File name of the synthesized reply artifact.
    pub artifact_file_name: String,

    /// Speak a reply that arrived while paused once the user resumes.
    pub speak_deferred_replies: bool,

    /// External synthesizer invocation. `{voice}`, `{output}` and `{text}`
    /// are substituted per argument.
    pub synthesizer_command: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            generation: GenerationSettings::default(),
            safety_threshold: SafetyThreshold::default(),
            system_instruction: Some(DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            artifact_file_name: DEFAULT_ARTIFACT_FILE_NAME.to_string(),
            speak_deferred_replies: true,
            synthesizer_command: ["espeak-ng", "-v", "{voice}", "-w", "{output}", "{text}"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let settings: Self =
            serde_json::from_str(&raw).map_err(|e| SettingsError::Parse(e.to_string()))?;
        validate_settings(&settings)?;
        Ok(settings)
    }

    /// Persist settings as pretty-printed JSON.
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        validate_settings(self)?;
        let json =
            serde_json::to_string_pretty(self).map_err(|e| SettingsError::Parse(e.to_string()))?;
        fs::write(path, json).map_err(|e| SettingsError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Model name cannot be empty")]
    EmptyModelName,

    #[error("Temperature must be between 0.0 and 2.0, got {0}")]
    InvalidTemperature(f32),

    #[error("top_p must be between 0.0 and 1.0, got {0}")]
    InvalidTopP(f32),

    #[error("max_output_tokens must be at least 1")]
    InvalidMaxOutputTokens,

    #[error("Voice id cannot be empty")]
    EmptyVoiceId,

    #[error("Artifact file name must be a plain file name, got '{0}'")]
    InvalidArtifactName(String),

    #[error("Synthesizer command must name a program and use {{output}}")]
    InvalidSynthesizerCommand,

    #[error("Failed to access settings file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Invalid settings file: {0}")]
    Parse(String),
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if settings.model_name.trim().is_empty() {
        return Err(SettingsError::EmptyModelName);
    }

    let generation = &settings.generation;
    if !(0.0..=2.0).contains(&generation.temperature) {
        return Err(SettingsError::InvalidTemperature(generation.temperature));
    }
    if !(0.0..=1.0).contains(&generation.top_p) {
        return Err(SettingsError::InvalidTopP(generation.top_p));
    }
    if generation.max_output_tokens == 0 {
        return Err(SettingsError::InvalidMaxOutputTokens);
    }

    if settings.voice_id.trim().is_empty() {
        return Err(SettingsError::EmptyVoiceId);
    }

    let name = settings.artifact_file_name.as_str();
    if name.trim().is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(SettingsError::InvalidArtifactName(name.to_string()));
    }

    let command = &settings.synthesizer_command;
    if command.first().is_none_or(|program| program.trim().is_empty())
        || !command.iter().any(|arg| arg.contains("{output}"))
    {
        return Err(SettingsError::InvalidSynthesizerCommand);
    }

    Ok(())
}
