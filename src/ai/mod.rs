//! Gateway to the hosted completion/vision model.
//!
//! `client` speaks the wire protocol, `recognition` and `generation` build
//! prompts on top of it and turn model text into typed values.

pub mod client;
pub mod generation;
pub mod recognition;

use thiserror::Error;

pub use client::{AiClient, ChatMessage, ChatRequest, ModelTier, OpenAiClient};

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI client is not configured")]
    NotConfigured,

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("rate limited by AI provider")]
    RateLimited,

    #[error("AI provider quota exhausted")]
    QuotaExceeded,

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("AI provider error: {0}")]
    Api(String),

    #[error("could not parse AI response: {0}")]
    Parse(String),

    #[error("could not parse recognized ingredients: {0}")]
    UnreadableIngredients(String),
}

impl AiError {
    pub fn code(&self) -> &'static str {
        match self {
            AiError::NotConfigured => "AI_NOT_CONFIGURED",
            AiError::InvalidApiKey => "INVALID_API_KEY",
            AiError::RateLimited => "RATE_LIMIT",
            AiError::QuotaExceeded => "INSUFFICIENT_QUOTA",
            AiError::ModelUnavailable(_) => "MODEL_NOT_FOUND",
            AiError::Network(_) => "NETWORK_ERROR",
            AiError::Api(_) => "AI_ERROR",
            AiError::Parse(_) | AiError::UnreadableIngredients(_) => "PARSE_ERROR",
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            AiError::Parse(_) => "Failed to parse AI response",
            AiError::UnreadableIngredients(_) => "Failed to parse ingredient recognition results",
            _ => "AI request failed",
        }
    }

    /// Human readable hint returned to the caller in `details`.
    pub fn remediation(&self) -> String {
        match self {
            AiError::NotConfigured => {
                "Set a valid OPENAI_API_KEY in the server environment and restart".into()
            }
            AiError::InvalidApiKey => "The configured OpenAI API key was rejected".into(),
            AiError::RateLimited => "Rate limit exceeded, wait a moment and retry".into(),
            AiError::QuotaExceeded => "The AI account has insufficient credits".into(),
            AiError::ModelUnavailable(model) => {
                format!("Model {} is not available for this account", model)
            }
            AiError::Network(_) => "Could not reach the AI provider".into(),
            AiError::Api(msg) => msg.clone(),
            AiError::Parse(_) | AiError::UnreadableIngredients(_) => {
                "The AI response was not in the expected format".into()
            }
        }
    }
}

/// Returns the slice from the first `open` to the last `close` delimiter,
/// inclusive. Models tend to wrap JSON in prose or code fences.
pub(crate) fn delimited_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
