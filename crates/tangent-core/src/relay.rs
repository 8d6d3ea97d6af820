//! Relay wire format and provider dispatch
//!
//! The relay is stateless: one request in, one vendor call, one answer out.
//! Host-specific HTTP plumbing lives in the `tangent-relay` binary; this module
//! owns validation, the per-provider quirks and the error texts clients show
//! to users verbatim.

use std::collections::BTreeMap;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::ai::{claude, gemini, openai, ClaudeClient, GeminiClient, OpenAIClient};
use crate::provider::Provider;
use crate::state::ChatMessage;

/// Answer used when a vendor returns no text
pub const EMPTY_RESPONSE: &str = "Sorry, I couldn't generate a response.";

/// Body of `POST /api/chat`. Fields are optional on the wire so missing ones
/// surface as a validation error rather than a decoding failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, model: &str, provider: Provider, api_key: &str) -> Self {
        Self {
            messages: Some(messages),
            model: Some(model.to_string()),
            provider: Some(provider.as_str().to_string()),
            api_key: Some(api_key.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFailure {
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("Provider {0} not supported yet")]
    UnsupportedProvider(String),
    #[error("API Error: {0}")]
    Upstream(String),
}

impl RelayError {
    /// HTTP status the relay answers with
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::MissingFields | RelayError::UnsupportedProvider(_) => 400,
            RelayError::Upstream(_) => 500,
        }
    }

    pub fn to_failure(&self) -> ChatFailure {
        ChatFailure {
            error: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAISettings {
    pub base_url: String,
    /// Display name to concrete model id
    pub models: BTreeMap<String, String>,
    /// Id used for display names missing from `models`
    pub fallback_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            base_url: openai::DEFAULT_BASE_URL.to_string(),
            models: BTreeMap::from([("GPT-4".to_string(), "gpt-4".to_string())]),
            fallback_model: "gpt-3.5-turbo".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

impl OpenAISettings {
    pub fn model_id(&self, display_name: &str) -> &str {
        self.models
            .get(display_name)
            .map(String::as_str)
            .unwrap_or(&self.fallback_model)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicSettings {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for AnthropicSettings {
    fn default() -> Self {
        Self {
            base_url: claude::DEFAULT_BASE_URL.to_string(),
            model: "claude-3-sonnet-20240229".to_string(),
            max_tokens: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    pub base_url: String,
    pub model: String,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            base_url: gemini::DEFAULT_BASE_URL.to_string(),
            model: "gemini-1.5-flash".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub openai: OpenAISettings,
    pub anthropic: AnthropicSettings,
    pub google: GoogleSettings,
}

/// A request that passed validation
struct Validated {
    messages: Vec<ChatMessage>,
    model: String,
    provider: Provider,
    api_key: String,
}

fn validate(request: ChatRequest) -> Result<Validated, RelayError> {
    let (Some(messages), Some(model), Some(provider), Some(api_key)) = (
        request.messages,
        request.model,
        request.provider,
        request.api_key,
    ) else {
        return Err(RelayError::MissingFields);
    };
    if messages.is_empty() || model.is_empty() || provider.is_empty() || api_key.is_empty() {
        return Err(RelayError::MissingFields);
    }

    let provider = match Provider::from_str(&provider) {
        Some(p @ (Provider::OpenAI | Provider::Anthropic | Provider::Google)) => p,
        _ => return Err(RelayError::UnsupportedProvider(provider)),
    };

    Ok(Validated {
        messages,
        model,
        provider,
        api_key,
    })
}

#[derive(Clone)]
pub struct Relay {
    client: Client,
    config: RelayConfig,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Validate `request`, call the vendor it names and return the answer text
    pub async fn handle(&self, request: ChatRequest) -> Result<String, RelayError> {
        let request = validate(request)?;
        info!(
            provider = %request.provider,
            model = %request.model,
            messages = request.messages.len(),
            "relaying chat request"
        );

        let answer = match request.provider {
            Provider::OpenAI => {
                let settings = &self.config.openai;
                OpenAIClient::new(self.client.clone(), &request.api_key, &settings.base_url)
                    .chat(
                        settings.model_id(&request.model),
                        &request.messages,
                        settings.max_tokens,
                        settings.temperature,
                    )
                    .await
            }
            Provider::Anthropic => {
                let settings = &self.config.anthropic;
                ClaudeClient::new(self.client.clone(), &request.api_key, &settings.base_url)
                    .messages(&settings.model, settings.max_tokens, &request.messages)
                    .await
            }
            Provider::Google => {
                // Only the latest turn is forwarded to this provider
                let settings = &self.config.google;
                let prompt = request
                    .messages
                    .last()
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                GeminiClient::new(self.client.clone(), &request.api_key, &settings.base_url)
                    .generate_content(&settings.model, prompt)
                    .await
            }
            Provider::Ollama => return Err(RelayError::UnsupportedProvider(request.provider.to_string())),
        };

        match answer {
            Ok(text) => Ok(text.unwrap_or_else(|| EMPTY_RESPONSE.to_string())),
            Err(e) => {
                error!(provider = %request.provider, error = %e, "vendor call failed");
                Err(RelayError::Upstream(e.to_string()))
            }
        }
    }
}
