//! Public configuration for the Gemini client.

use std::time::Duration;

use palaver_core::{GenerationSettings, SafetyThreshold, Settings};

/// Configuration for [`GeminiChat`](crate::GeminiChat).
///
/// # Example
///
/// ```
/// use palaver_gemini::GeminiConfig;
/// use std::time::Duration;
///
/// let config = GeminiConfig::new("secret-key")
///     .with_model("gemini-1.5-flash")
///     .with_timeout(Duration::from_secs(20));
/// ```
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL of the Generative Language API.
    pub(crate) base_url: String,
    /// API key sent in the `x-goog-api-key` header.
    pub(crate) api_key: String,
    /// Model identifier, e.g. `gemini-1.5-pro-latest`.
    pub(crate) model: String,
    /// Sampling parameters.
    pub(crate) generation: GenerationSettings,
    /// Threshold applied to every harm category.
    pub(crate) safety_threshold: SafetyThreshold,
    /// Optional system instruction.
    pub(crate) system_instruction: Option<String>,
    /// Request timeout.
    pub(crate) timeout: Duration,
    /// User agent string for HTTP requests.
    pub(crate) user_agent: String,
}

impl GeminiConfig {
    /// Create a configuration with defaults and the given API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        let defaults = Settings::default();
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: api_key.into(),
            model: defaults.model_name,
            generation: defaults.generation,
            safety_threshold: defaults.safety_threshold,
            system_instruction: defaults.system_instruction,
            timeout: Duration::from_secs(60),
            user_agent: concat!("palaver-gemini/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Create a configuration from application settings.
    #[must_use]
    pub fn from_settings(api_key: impl Into<String>, settings: &Settings) -> Self {
        Self::new(api_key)
            .with_model(settings.model_name.clone())
            .with_generation(settings.generation.clone())
            .with_safety_threshold(settings.safety_threshold)
            .with_system_instruction(settings.system_instruction.clone())
    }

    /// Override the API base URL (tests point this at a mock server).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling parameters.
    #[must_use]
    pub fn with_generation(mut self, generation: GenerationSettings) -> Self {
        self.generation = generation;
        self
    }

    /// Set the safety threshold.
    #[must_use]
    pub const fn with_safety_threshold(mut self, threshold: SafetyThreshold) -> Self {
        self.safety_threshold = threshold;
        self
    }

    /// Set or clear the system instruction.
    #[must_use]
    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction;
        self
    }

    /// Set the request timeout.
    ///
    /// Defaults to 60 seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Endpoint for a single `generateContent` call.
    pub(crate) fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}
