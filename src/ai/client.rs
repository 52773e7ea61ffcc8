use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::AiError;
use crate::config::AiConfig;

/// Which configured model a request should go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Primary,
    Fallback,
    Vision,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_with_image(text: impl Into<String>, data_url: String) -> Self {
        Self {
            role: "user",
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: data_url },
                },
            ]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub tier: ModelTier,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub json_mode: bool,
}

impl ChatRequest {
    pub fn new(tier: ModelTier, messages: Vec<ChatMessage>) -> Self {
        Self {
            tier,
            messages,
            temperature: None,
            max_tokens: None,
            json_mode: false,
        }
    }
}

/// Text completion over a hosted model. Returns the first choice's content.
#[async_trait]
pub trait AiClient: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<String, AiError>;

    /// Model name a tier resolves to, for logging and error messages.
    fn model_name(&self, tier: ModelTier) -> String;
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireErrorEnvelope {
    #[serde(default)]
    error: WireError,
}

#[derive(Deserialize, Default)]
struct WireError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// OpenAI-compatible chat completions client.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    fallback_model: String,
    vision_model: String,
}

impl OpenAiClient {
    pub fn new(config: &AiConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            fallback_model: config.fallback_model.clone(),
            vision_model: config.vision_model.clone(),
        })
    }
}

fn classify_failure(status: StatusCode, body: &str, model: &str) -> AiError {
    let err = serde_json::from_str::<WireErrorEnvelope>(body)
        .unwrap_or_default()
        .error;
    let code = err.code.as_deref().unwrap_or_default();
    let quota = code == "insufficient_quota" || err.message.contains("quota");

    match status {
        StatusCode::UNAUTHORIZED => AiError::InvalidApiKey,
        _ if code == "invalid_api_key" => AiError::InvalidApiKey,
        _ if quota => AiError::QuotaExceeded,
        StatusCode::TOO_MANY_REQUESTS => AiError::RateLimited,
        StatusCode::NOT_FOUND => AiError::ModelUnavailable(model.to_string()),
        _ if code == "model_not_found" => AiError::ModelUnavailable(model.to_string()),
        _ => AiError::Api(format!("{}: {}", status, err.message)),
    }
}

#[async_trait]
impl AiClient for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::NotConfigured)?;
        let model = self.model_name(request.tier);

        let wire = WireRequest {
            model: &model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .json_mode
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        debug!(model = %model, messages = request.messages.len(), "sending chat completion");
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&wire)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_failure(status, &body, &model);
            warn!(model = %model, %status, code = err.code(), "chat completion failed");
            return Err(err);
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| AiError::Api(format!("malformed completion payload: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| AiError::Api("completion had no content".into()))
    }

    fn model_name(&self, tier: ModelTier) -> String {
        match tier {
            ModelTier::Primary => self.model.clone(),
            ModelTier::Fallback => self.fallback_model.clone(),
            ModelTier::Vision => self.vision_model.clone(),
        }
    }
}
