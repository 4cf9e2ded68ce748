//! Internal error types for Gemini operations.
//!
//! These errors are internal to `palaver-gemini` and are mapped to the core
//! [`ChatError`] at the port boundary.

use palaver_core::ChatError;
use thiserror::Error;

/// Errors related to Gemini API operations.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// The API answered with an error status.
    #[error("{message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message from the error body, or the status text
        message: String,
    },

    /// The prompt or every candidate was blocked.
    #[error("Response blocked: {reason}")]
    Blocked { reason: String },

    /// The API returned no text.
    #[error("The model returned no content")]
    EmptyResponse,

    /// Network or HTTP client error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("Invalid response from Gemini API: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl From<GeminiError> for ChatError {
    fn from(err: GeminiError) -> Self {
        Self::remote(err.to_string())
    }
}
