mod catalog;

pub use catalog::ModelCatalog;

use std::time::Duration;

use futures::StreamExt;
use log::{debug, info};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::relay::ChunkStream;
use crate::web::models::{BackendChatRequest, ChatMessage, ModelInfo, ModelList};

/// HTTP client for an Ollama inference server.
pub struct OllamaClient {
    server_url: String,
    client: Client,
    response_timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: &RelayConfig) -> RelayResult<Self> {
        info!("Using inference backend at: {}", config.backend_url);

        // No overall request timeout: a generation may legitimately stream for minutes.
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| RelayError::BackendUnreachable(e.to_string()))?;

        Ok(Self {
            server_url: config.backend_url.clone(),
            client,
            response_timeout: config.read_timeout,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.server_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.server_url)
    }

    pub async fn list_models(&self) -> RelayResult<Vec<ModelInfo>> {
        let response = self.send(self.client.get(self.tags_url())).await?;
        let list: ModelList = response.json().await.map_err(RelayError::from_transport)?;
        debug!("Backend lists {} models", list.models.len());
        Ok(list.models)
    }

    /// Start a streaming chat; the returned stream yields the raw NDJSON body.
    pub async fn open_chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> RelayResult<ChunkStream> {
        let payload = BackendChatRequest {
            model,
            messages,
            stream: true,
        };
        info!(
            "Opening chat stream for model {} with {} messages",
            model,
            messages.len()
        );

        let response = self.send(self.client.post(self.chat_url()).json(&payload)).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(RelayError::from_transport))
            .boxed())
    }

    /// Single-shot chat; the backend's JSON answer is returned untouched.
    pub async fn chat(&self, model: &str, messages: &[ChatMessage]) -> RelayResult<Value> {
        let payload = BackendChatRequest {
            model,
            messages,
            stream: false,
        };
        debug!("Sending non-streaming chat for model {}", model);

        let response = self.send(self.client.post(self.chat_url()).json(&payload)).await?;
        response.json().await.map_err(RelayError::from_transport)
    }

    // Waits for response headers and turns non-2xx answers into errors.
    async fn send(&self, request: RequestBuilder) -> RelayResult<Response> {
        let response = tokio::time::timeout(self.response_timeout, request.send())
            .await
            .map_err(|_| {
                RelayError::BackendTimeout(format!(
                    "no response within {:?}",
                    self.response_timeout
                ))
            })?
            .map_err(|e| match RelayError::from_transport(e) {
                RelayError::BackendStreamInterrupted(msg) => RelayError::BackendUnreachable(msg),
                other => other,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!("Could not read backend error body: {}", e);
                String::new()
            }
        };
        Err(RelayError::BackendRejected {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }
}

/// Pull the `error` field out of an Ollama error body, falling back to the raw
/// text, then to the status reason when the body is empty.
fn error_message(status: StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    if !message.is_empty() {
        return message;
    }
    status
        .canonical_reason()
        .unwrap_or("no error details")
        .to_string()
}
