use async_openai::{
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessageArgs, CreateChatCompletionRequestArgs,
        CreateEmbeddingRequestArgs, Role,
    },
    Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use std::{sync::Arc, time::Duration};
use tracing::debug;

use super::{with_timeout, Embedder, Generator, ServiceError};
use crate::config::Config;

#[derive(Clone)]
pub struct OpenAI {
    client: Arc<Client>,
    embedding_model: String,
    generation_model: String,
    timeout: Option<Duration>,
}

impl OpenAI {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        // Give up on the first rate-limit response instead of retrying.
        let backoff = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        let mut client = Client::new()
            .with_api_key(&config.api_key)
            .with_backoff(backoff);

        if let Some(base) = &config.api_base {
            client = client.with_api_base(base);
        }

        Self {
            client: Arc::new(client),
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
            timeout: config.timeout,
        }
    }
}

#[async_trait]
impl Embedder for OpenAI {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .input(texts.to_vec())
            .build()
            .map_err(|err| ServiceError::Other(err.to_string()))?;

        let response = with_timeout(self.timeout, async {
            self.client
                .embeddings()
                .create(request)
                .await
                .map_err(|err| classify(err, &self.embedding_model))
        })
        .await?;

        let mut data = response.data;
        data.sort_by_key(|embedding| embedding.index);
        debug!("Embedded {} documents", data.len());

        Ok(data.into_iter().map(|e| e.embedding).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        self.embed_documents(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(ServiceError::EmptyResponse)
    }

    fn model(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl Generator for OpenAI {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        let message = ChatCompletionRequestMessageArgs::default()
            .role(Role::User)
            .content(prompt)
            .build()
            .map_err(|err| ServiceError::Other(err.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.generation_model)
            .messages(vec![message])
            .build()
            .map_err(|err| ServiceError::Other(err.to_string()))?;

        let response = with_timeout(self.timeout, async {
            self.client
                .chat()
                .create(request)
                .await
                .map_err(|err| classify(err, &self.generation_model))
        })
        .await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(ServiceError::EmptyResponse)?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(ServiceError::SafetyBlocked("content_filter".to_string()));
        }

        if choice.message.content.trim().is_empty() {
            return Err(ServiceError::EmptyResponse);
        }

        Ok(choice.message.content)
    }

    fn model(&self) -> &str {
        &self.generation_model
    }
}

fn classify(err: OpenAIError, model: &str) -> ServiceError {
    match err {
        OpenAIError::ApiError(err) => classify_message(&err.message, model),
        err => ServiceError::Other(err.to_string()),
    }
}

fn classify_message(message: &str, model: &str) -> ServiceError {
    let lower = message.to_lowercase();

    if lower.contains("api key") || lower.contains("invalid_api_key") {
        ServiceError::Unauthenticated(message.to_string())
    } else if lower.contains("rate limit") || lower.contains("quota") {
        ServiceError::RateLimited(message.to_string())
    } else if lower.contains("does not exist") || lower.contains("model_not_found") {
        ServiceError::ModelNotFound(model.to_string())
    } else if lower.contains("permission") || lower.contains("not allowed") {
        ServiceError::PermissionDenied(message.to_string())
    } else {
        ServiceError::Other(message.to_string())
    }
}
