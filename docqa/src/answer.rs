use std::fmt::Display;
use tracing::{error, info, warn};

use crate::{
    build_prompt,
    index::PointResult,
    provider::{Generator, ServiceError},
};

/// The result of asking the model, successful or not. Displays as the text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    Blocked(String),
    Empty,
    InvalidCredential,
    RateLimited,
    ModelNotFound(String),
    Failed(String),
}

impl Answer {
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

impl From<ServiceError> for Answer {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::SafetyBlocked(reason) => Self::Blocked(reason),
            ServiceError::EmptyResponse => Self::Empty,
            ServiceError::Unauthenticated(_) | ServiceError::PermissionDenied(_) => {
                Self::InvalidCredential
            }
            ServiceError::RateLimited(_) => Self::RateLimited,
            ServiceError::ModelNotFound(model) => Self::ModelNotFound(model),
            err @ (ServiceError::Timeout(_) | ServiceError::Other(_)) => {
                Self::Failed(err.to_string())
            }
        }
    }
}

impl Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text}"),
            Self::Blocked(_) => write!(f, "Response was blocked due to safety settings."),
            Self::Empty => write!(f, "Model returned an empty response."),
            Self::InvalidCredential => write!(f, "Error: Invalid API Key for generation model."),
            Self::RateLimited => write!(f, "Error: API rate limit exceeded for generation."),
            Self::ModelNotFound(model) => write!(
                f,
                "Error: Generation model specified ('{model}') not found or unavailable."
            ),
            Self::Failed(err) => write!(f, "An error occurred during generation: {err}"),
        }
    }
}

/// Asks the model to answer `query` from `context` alone.
pub async fn generate_answer(
    generator: &dyn Generator,
    query: &str,
    context: &[PointResult],
) -> Answer {
    if context.is_empty() {
        warn!("No context provided. Generating answer based on query alone (may be less accurate).");
    }

    let prompt = build_prompt(query, context);
    info!("Generating answer with {}", generator.model());

    match generator.generate(&prompt).await {
        Ok(text) if text.trim().is_empty() => {
            warn!("Received an empty response from the model.");
            Answer::Empty
        }
        Ok(text) => Answer::Text(text.trim().to_string()),
        Err(err) => {
            match &err {
                ServiceError::SafetyBlocked(reason) => {
                    warn!("Response blocked due to {reason}");
                }
                ServiceError::EmptyResponse => warn!("Received an empty response from the model."),
                err => error!("Error generating answer with {}: {err}", generator.model()),
            }

            err.into()
        }
    }
}
