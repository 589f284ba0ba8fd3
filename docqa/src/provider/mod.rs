mod gemini;
mod openai;

pub use gemini::Gemini;
pub use openai::OpenAI;

use async_trait::async_trait;
use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;

use crate::config::{Config, Provider};

/// Why a call to a hosted model failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("invalid API key: {0}")]
    Unauthenticated(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("rate limit or quota exceeded: {0}")]
    RateLimited(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("blocked by safety filters ({0})")]
    SafetyBlocked(String),

    #[error("the model returned an empty response")]
    EmptyResponse,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

/// Turns text into vectors. Documents and queries must be embedded by the same model.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError>;

    fn model(&self) -> &str;
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model's raw text for a single-turn prompt.
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError>;

    fn model(&self) -> &str;
}

/// Builds the embedder and generator for the configured provider.
#[must_use]
pub fn from_config(config: &Config) -> (Arc<dyn Embedder>, Arc<dyn Generator>) {
    fn pair<T: Embedder + Generator + Clone + 'static>(
        client: T,
    ) -> (Arc<dyn Embedder>, Arc<dyn Generator>) {
        let embedder: Arc<dyn Embedder> = Arc::new(client.clone());
        let generator: Arc<dyn Generator> = Arc::new(client);

        (embedder, generator)
    }

    match config.provider {
        Provider::Gemini => pair(Gemini::new(config)),
        Provider::OpenAI => pair(OpenAI::new(config)),
    }
}

pub(crate) async fn with_timeout<T>(
    timeout: Option<Duration>,
    request: impl Future<Output = Result<T, ServiceError>> + Send,
) -> Result<T, ServiceError> {
    match timeout {
        Some(duration) => tokio::time::timeout(duration, request)
            .await
            .map_err(|_| ServiceError::Timeout(duration))?,
        None => request.await,
    }
}
