//! HTTP transport for the assistant backend

use super::types::{ChatReply, ChatRequest};
use super::{AssistantBackend, BackendError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Longest slice of an error body kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Posts [`ChatRequest`]s as JSON to a single chat endpoint
pub struct HttpAssistantBackend {
    client: Client,
    endpoint: String,
}

impl HttpAssistantBackend {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl AssistantBackend for HttpAssistantBackend {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        response
            .json::<ChatReply>()
            .await
            .map_err(|e| BackendError::decode(format!("Invalid reply body: {e}")))
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn classify_transport_error(error: reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::timeout(format!("Request timed out: {error}"))
    } else if error.is_decode() {
        BackendError::decode(error.to_string())
    } else if error.is_connect() || error.is_request() {
        BackendError::network(error.to_string())
    } else {
        BackendError::unknown(error.to_string())
    }
}

fn classify_status(status: StatusCode, body: &str) -> BackendError {
    let excerpt: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    let message = format!("Backend returned {status}: {excerpt}");
    if status.is_server_error() {
        BackendError::server_error(message)
    } else if status.is_client_error() {
        BackendError::invalid_request(message)
    } else {
        BackendError::unknown(message)
    }
}
