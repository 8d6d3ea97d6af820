//! Client side of the relay: one HTTP request per send

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::catalog::ModelCatalog;
use crate::credentials::{credential_for_model, Credential};
use crate::relay::{ChatFailure, ChatReply, ChatRequest};
use crate::state::ChatMessage;

/// Why a send produced no answer. The display text is what the panel shows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("No API key configured for {model}. Add one in the key manager.")]
    MissingCredential { model: String },
    #[error("{0}")]
    Relay(String),
    #[error("Network error: {0}")]
    Network(String),
}

#[async_trait]
pub trait RelayClient: Send + Sync {
    async fn send(&self, model_name: &str, messages: &[ChatMessage]) -> Result<String, SendError>;
}

#[derive(Clone)]
pub struct HttpRelayClient {
    client: Client,
    endpoint: String,
    catalog: ModelCatalog,
    credentials: Vec<Credential>,
}

impl HttpRelayClient {
    pub fn new(endpoint: &str, catalog: ModelCatalog, credentials: Vec<Credential>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            catalog,
            credentials,
        }
    }

    pub fn set_credentials(&mut self, credentials: Vec<Credential>) {
        self.credentials = credentials;
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn send(&self, model_name: &str, messages: &[ChatMessage]) -> Result<String, SendError> {
        let credential = credential_for_model(&self.credentials, &self.catalog, model_name)
            .ok_or_else(|| SendError::MissingCredential {
                model: model_name.to_string(),
            })?;
        debug!(model = model_name, provider = %credential.provider, "sending to relay");

        let request = ChatRequest::new(
            messages.to_vec(),
            model_name,
            credential.provider,
            &credential.key,
        );
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| SendError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ChatFailure>(&body)
                .map(|f| f.error)
                .unwrap_or_else(|_| format!("Relay error {}: {}", status, body));
            return Err(SendError::Relay(message));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| SendError::Network(e.to_string()))?;
        Ok(reply.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn spawn_relay(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/chat", addr)
    }

    fn keys() -> Vec<Credential> {
        vec![Credential::new(Provider::Anthropic, "ak-1", "main")]
    }

    #[tokio::test]
    async fn test_send_posts_resolved_credential() {
        let router = Router::new().route(
            "/api/chat",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["provider"], "Anthropic");
                assert_eq!(body["apiKey"], "ak-1");
                assert_eq!(body["model"], "Claude");
                Json(json!({"response": "hello back"}))
            }),
        );
        let endpoint = spawn_relay(router).await;
        let client = HttpRelayClient::new(&endpoint, ModelCatalog::default(), keys());

        let answer = client
            .send("Claude", &[ChatMessage::user("hello")])
            .await
            .unwrap();
        assert_eq!(answer, "hello back");
    }

    #[tokio::test]
    async fn test_relay_error_body_is_verbatim() {
        let router = Router::new().route(
            "/api/chat",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "API Error: rate limited"})),
                )
            }),
        );
        let endpoint = spawn_relay(router).await;
        let client = HttpRelayClient::new(&endpoint, ModelCatalog::default(), keys());

        let err = client
            .send("Claude", &[ChatMessage::user("hello")])
            .await
            .unwrap_err();
        assert_eq!(err, SendError::Relay("API Error: rate limited".to_string()));
        assert_eq!(err.to_string(), "API Error: rate limited");
    }

    #[tokio::test]
    async fn test_missing_credential_skips_network() {
        // Unroutable endpoint: reaching the network would fail differently
        let client = HttpRelayClient::new("http://127.0.0.1:9/api/chat", ModelCatalog::default(), keys());
        let err = client
            .send("GPT-4", &[ChatMessage::user("hello")])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SendError::MissingCredential {
                model: "GPT-4".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = format!("http://{}/api/chat", addr);
        let client = HttpRelayClient::new(&endpoint, ModelCatalog::default(), keys());
        let err = client
            .send("Claude", &[ChatMessage::user("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::Network(_)));
    }
}
