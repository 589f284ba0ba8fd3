use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, time::Duration};
use tracing::debug;

use super::{with_timeout, Embedder, Generator, ServiceError};
use crate::config::Config;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const SAFETY_FINISH_REASONS: [&str; 4] = ["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

/// Google's Generative Language API.
#[derive(Clone)]
pub struct Gemini {
    client: Client,
    base_url: String,
    api_key: String,
    embedding_model: String,
    generation_model: String,
    timeout: Option<Duration>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [Part<'a>; 1],
}

impl<'a> Content<'a> {
    const fn text(text: &'a str) -> Self {
        Self {
            role: None,
            parts: [Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<Value>,
}

impl fmt::Debug for Gemini {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gemini")
            .field("base_url", &self.base_url)
            .field("embedding_model", &self.embedding_model)
            .field("generation_model", &self.generation_model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Gemini {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: config.api_key.clone(),
            embedding_model: model_path(&config.embedding_model),
            generation_model: model_path(&config.generation_model),
            timeout: config.timeout,
        }
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned + Send>(
        &self,
        model: &str,
        method: &str,
        body: &B,
    ) -> Result<R, ServiceError> {
        let request = async {
            let response = self
                .client
                .post(format!("{}/{model}:{method}", self.base_url))
                .header("x-goog-api-key", &self.api_key)
                .json(body)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            let text = response.text().await.map_err(transport_error)?;

            if !status.is_success() {
                return Err(classify_error(status, &text, model));
            }

            serde_json::from_str(&text).map_err(|err| {
                ServiceError::Other(format!("Unexpected response from {model}:{method}: {err}"))
            })
        };

        with_timeout(self.timeout, request).await
    }
}

#[async_trait]
impl Embedder for Gemini {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: &self.embedding_model,
                    content: Content::text(text),
                    task_type: "RETRIEVAL_DOCUMENT",
                })
                .collect(),
        };

        let response: BatchEmbedResponse = self
            .post(&self.embedding_model, "batchEmbedContents", &request)
            .await?;
        debug!("Embedded {} documents", response.embeddings.len());

        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let request = EmbedRequest {
            model: &self.embedding_model,
            content: Content::text(text),
            task_type: "RETRIEVAL_QUERY",
        };

        let response: EmbedResponse = self
            .post(&self.embedding_model, "embedContent", &request)
            .await?;

        Ok(response.embedding.values)
    }

    fn model(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl Generator for Gemini {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        let request = GenerateRequest {
            contents: [Content {
                role: Some("user"),
                ..Content::text(prompt)
            }],
        };

        let response: GenerateResponse = self
            .post(&self.generation_model, "generateContent", &request)
            .await?;

        response_text(response)
    }

    fn model(&self) -> &str {
        &self.generation_model
    }
}

fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    ServiceError::Other(err.without_url().to_string())
}

fn classify_error(status: StatusCode, body: &str, model: &str) -> ServiceError {
    let error = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);

    let (message, status_name, reasons) = error.map_or_else(
        || (body.trim().to_string(), String::new(), vec![]),
        |error| {
            let reasons = error
                .details
                .iter()
                .filter_map(|detail| detail.get("reason").and_then(Value::as_str))
                .map(ToString::to_string)
                .collect::<Vec<_>>();

            (error.message, error.status, reasons)
        },
    );

    if status == StatusCode::UNAUTHORIZED
        || status_name == "UNAUTHENTICATED"
        || reasons.iter().any(|r| r == "API_KEY_INVALID")
    {
        return ServiceError::Unauthenticated(message);
    }

    match (status, status_name.as_str()) {
        (StatusCode::FORBIDDEN, _) | (_, "PERMISSION_DENIED") => {
            ServiceError::PermissionDenied(message)
        }
        (StatusCode::TOO_MANY_REQUESTS, _) | (_, "RESOURCE_EXHAUSTED") => {
            ServiceError::RateLimited(message)
        }
        (StatusCode::NOT_FOUND, _) | (_, "NOT_FOUND") => ServiceError::ModelNotFound(
            model.trim_start_matches("models/").to_string(),
        ),
        _ => ServiceError::Other(format!("{status}: {message}")),
    }
}

fn response_text(response: GenerateResponse) -> Result<String, ServiceError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ServiceError::SafetyBlocked(reason));
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(ServiceError::EmptyResponse);
    };

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(match candidate.finish_reason {
            Some(reason) if SAFETY_FINISH_REASONS.contains(&reason.as_str()) => {
                ServiceError::SafetyBlocked(reason)
            }
            _ => ServiceError::EmptyResponse,
        });
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Provider, Answer};

    fn parse(json: &str) -> GenerateResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn should_prefix_model_paths() {
        assert_eq!(model_path("gemini-2.0-flash"), "models/gemini-2.0-flash");
        assert_eq!(model_path("models/embedding-001"), "models/embedding-001");
    }

    #[test]
    fn should_classify_invalid_keys() {
        // Given
        let body = r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT", "details": [{"@type": "type.googleapis.com/google.rpc.ErrorInfo", "reason": "API_KEY_INVALID"}]}}"#;

        // When
        let error = classify_error(StatusCode::BAD_REQUEST, body, "models/embedding-001");

        // Then
        assert_eq!(
            error,
            ServiceError::Unauthenticated(
                "API key not valid. Please pass a valid API key.".to_string()
            )
        );
    }

    #[test]
    fn should_classify_by_status() {
        let quota = r#"{"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}"#;
        let denied = r#"{"error": {"code": 403, "message": "Permission denied", "status": "PERMISSION_DENIED"}}"#;
        let missing = r#"{"error": {"code": 404, "message": "models/nope is not found", "status": "NOT_FOUND"}}"#;

        assert!(matches!(
            classify_error(StatusCode::TOO_MANY_REQUESTS, quota, "models/x"),
            ServiceError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, denied, "models/x"),
            ServiceError::PermissionDenied(_)
        ));
        assert_eq!(
            classify_error(StatusCode::NOT_FOUND, missing, "models/nope"),
            ServiceError::ModelNotFound("nope".to_string())
        );
        assert_eq!(
            classify_error(StatusCode::BAD_GATEWAY, "upstream down", "models/x"),
            ServiceError::Other("502 Bad Gateway: upstream down".to_string())
        );
    }

    #[test]
    fn should_join_response_parts() {
        // Given
        let response = parse(
            r#"{"candidates": [{"content": {"parts": [{"text": "Blue"}, {"text": "."}], "role": "model"}, "finishReason": "STOP"}]}"#,
        );

        // Then
        assert_eq!(response_text(response).unwrap(), "Blue.");
    }

    #[test]
    fn should_detect_blocked_prompts() {
        // Given
        let response = parse(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#);

        // Then
        assert_eq!(
            response_text(response).unwrap_err(),
            ServiceError::SafetyBlocked("SAFETY".to_string())
        );
    }

    #[test]
    fn should_detect_blocked_candidates() {
        // Given
        let response = parse(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#);

        // Then
        assert_eq!(
            response_text(response).unwrap_err(),
            ServiceError::SafetyBlocked("SAFETY".to_string())
        );
    }

    #[test]
    fn should_detect_empty_responses() {
        assert_eq!(
            response_text(parse("{}")).unwrap_err(),
            ServiceError::EmptyResponse
        );
        assert_eq!(
            response_text(parse(
                r#"{"candidates": [{"content": {"parts": []}, "finishReason": "STOP"}]}"#
            ))
            .unwrap_err(),
            ServiceError::EmptyResponse
        );
    }

    #[test]
    fn should_serialize_embedding_requests() {
        // When
        let body = serde_json::to_value(BatchEmbedRequest {
            requests: vec![EmbedRequest {
                model: "models/embedding-001",
                content: Content::text("hello"),
                task_type: "RETRIEVAL_DOCUMENT",
            }],
        })
        .unwrap();

        // Then
        assert_eq!(
            body,
            serde_json::json!({
                "requests": [{
                    "model": "models/embedding-001",
                    "content": { "parts": [{ "text": "hello" }] },
                    "taskType": "RETRIEVAL_DOCUMENT"
                }]
            })
        );
    }

    #[tokio::test]
    async fn should_keep_the_api_key_out_of_transport_errors() {
        // Given
        let mut config = Config::new(Provider::Gemini, "SECRET-KEY-123");
        config.api_base = Some("http://127.0.0.1:1".to_string());
        config.timeout = Some(Duration::from_secs(5));
        let gemini = Gemini::new(&config);

        // When
        let err = gemini.generate("hi").await.unwrap_err();
        let answer = Answer::from(err.clone());

        // Then
        assert!(matches!(err, ServiceError::Other(_) | ServiceError::Timeout(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"));
        assert!(!answer.to_string().contains("SECRET-KEY-123"));
    }
}
