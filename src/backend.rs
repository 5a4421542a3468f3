//! Assistant backend abstraction
//!
//! The controller talks to the remote assistant through [`AssistantBackend`];
//! production uses [`HttpAssistantBackend`], tests substitute mocks.

mod error;
mod http;
mod types;

pub use error::{BackendError, BackendErrorKind};
pub use http::HttpAssistantBackend;
pub use types::{ChatReply, ChatRequest};

use async_trait::async_trait;
use std::sync::Arc;

/// Remote assistant that answers one turn at a time
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Send one turn and wait for the assistant's reply
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, BackendError>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: AssistantBackend + ?Sized> AssistantBackend for Arc<T> {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        (**self).send(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Logging wrapper for backends
pub struct LoggingBackend<B> {
    inner: B,
}

impl<B: AssistantBackend> LoggingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<B: AssistantBackend> AssistantBackend for LoggingBackend<B> {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        let start = std::time::Instant::now();
        let result = self.inner.send(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    backend = %self.inner.name(),
                    duration_ms = %duration.as_millis(),
                    history_len = request.conversation_history.len(),
                    quick_replies = reply.suggested_replies().map_or(0, <[_]>::len),
                    "Assistant request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    backend = %self.inner.name(),
                    duration_ms = %duration.as_millis(),
                    kind = %e.kind,
                    error = %e.message,
                    "Assistant request failed"
                );
            }
        }

        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
