//! [`GeminiChat`] - a multi-turn chat session over `generateContent`.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use palaver_core::{ChatError, ChatSession, ChatTurn};

use crate::config::GeminiConfig;
use crate::error::GeminiError;
use crate::models::{
    ApiErrorBody, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    SafetySetting,
};

/// Chat session against the Gemini API.
///
/// History is seeded once and grows by one user/model pair per successful
/// [`send`](ChatSession::send). Failed sends leave history untouched.
pub struct GeminiChat {
    client: reqwest::Client,
    config: GeminiConfig,
    history: Mutex<Vec<ChatTurn>>,
}

impl GeminiChat {
    /// Start a chat with the given seed history.
    pub fn new(config: GeminiConfig, seed: Vec<ChatTurn>) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ChatError::remote(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            history: Mutex::new(seed),
        })
    }

    fn build_request(&self, text: &str) -> GenerateContentRequest {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);

        // Blank seed turns are valid history for us but rejected by the API.
        let mut contents: Vec<Content> = history
            .iter()
            .filter(|turn| !turn.text.trim().is_empty())
            .map(Content::from_turn)
            .collect();
        contents.push(Content::from_turn(&ChatTurn::user(text)));

        GenerateContentRequest {
            contents,
            system_instruction: self
                .config
                .system_instruction
                .as_ref()
                .map(|instruction| Content::text(None, instruction.clone())),
            generation_config: GenerationConfig::from(&self.config.generation),
            safety_settings: SafetySetting::all(self.config.safety_threshold),
        }
    }

    async fn generate(&self, text: &str) -> Result<String, GeminiError> {
        let request = self.build_request(text);

        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .ok()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
                });
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_slice(&body)?;
        extract_reply(parsed)
    }
}

/// Pull the reply text out of a successful response.
fn extract_reply(response: GenerateContentResponse) -> Result<String, GeminiError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GeminiError::Blocked { reason });
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(GeminiError::EmptyResponse);
    };

    let text = candidate
        .content
        .map(|c| c.joined_text())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match candidate.finish_reason.as_deref() {
            Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT")) => {
                Err(GeminiError::Blocked {
                    reason: reason.to_string(),
                })
            }
            _ => Err(GeminiError::EmptyResponse),
        };
    }

    Ok(text)
}

#[async_trait]
impl ChatSession for GeminiChat {
    async fn send(&self, text: &str) -> Result<String, ChatError> {
        tracing::debug!(model = %self.config.model, chars = text.len(), "Sending chat message");

        match self.generate(text).await {
            Ok(reply) => {
                let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
                history.push(ChatTurn::user(text));
                history.push(ChatTurn::model(reply.clone()));
                tracing::debug!(chars = reply.len(), turns = history.len(), "Received reply");
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Chat request failed");
                Err(e.into())
            }
        }
    }

    fn history(&self) -> Vec<ChatTurn> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
