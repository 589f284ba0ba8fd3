use std::{collections::HashMap, env, fmt::Display, str::FromStr, time::Duration};

use thiserror::Error;

use crate::index::Distance;

/// Target chunk length, in characters.
pub const CHUNK_SIZE: usize = 1000;
/// Characters shared by two adjacent chunks of the same document.
pub const CHUNK_OVERLAP: usize = 150;
/// Chunks sent to the embedding service per request.
pub const EMBEDDING_BATCH_SIZE: usize = 100;

const DEFAULT_TOP_K: usize = 4;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("${0} not set")]
    MissingVar(&'static str),

    #[error("Invalid value for ${name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAI,
}

impl Provider {
    const fn key_var(self) -> &'static str {
        match self {
            Self::Gemini => "GOOGLE_API_KEY",
            Self::OpenAI => "OPENAI_API_KEY",
        }
    }

    #[must_use]
    pub const fn default_embedding_model(self) -> &'static str {
        match self {
            Self::Gemini => "models/embedding-001",
            Self::OpenAI => "text-embedding-ada-002",
        }
    }

    #[must_use]
    pub const fn default_generation_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.0-flash",
            Self::OpenAI => "gpt-3.5-turbo",
        }
    }
}

impl FromStr for Provider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

impl Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "Gemini"),
            Self::OpenAI => write!(f, "OpenAI"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: Provider,
    pub api_key: String,
    pub api_base: Option<String>,
    pub embedding_model: String,
    pub generation_model: String,
    pub top_k: usize,
    pub ask_for_k: bool,
    pub distance: Distance,
    pub timeout: Option<Duration>,
}

impl Config {
    /// Builds a config for `provider` with every optional setting at its default.
    #[must_use]
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            api_base: None,
            embedding_model: provider.default_embedding_model().to_string(),
            generation_model: provider.default_generation_model().to_string(),
            top_k: DEFAULT_TOP_K,
            ask_for_k: true,
            distance: Distance::Euclidean,
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }

    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's API key is missing or a variable can't be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Reads the configuration from an explicit set of variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's API key is missing or a variable can't be parsed.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let provider = parse_var(&get("DOCQA_PROVIDER"), "DOCQA_PROVIDER")?
            .unwrap_or(Provider::Gemini);
        let api_key = get(provider.key_var()).ok_or(ConfigError::MissingVar(provider.key_var()))?;

        let mut config = Self::new(provider, api_key);
        config.api_base = get("DOCQA_API_BASE");

        if let Some(model) = get("DOCQA_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Some(model) = get("DOCQA_GENERATION_MODEL") {
            config.generation_model = model;
        }
        if let Some(top_k) = parse_var(&get("DOCQA_TOP_K"), "DOCQA_TOP_K")? {
            config.top_k = top_k;
        }
        if let Some(ask_for_k) = parse_var(&get("DOCQA_ASK_K"), "DOCQA_ASK_K")? {
            config.ask_for_k = ask_for_k;
        }
        if let Some(distance) = parse_var(&get("DOCQA_DISTANCE"), "DOCQA_DISTANCE")? {
            config.distance = distance;
        }
        if let Some(secs) = parse_var::<u64>(&get("DOCQA_TIMEOUT_SECS"), "DOCQA_TIMEOUT_SECS")? {
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(value: &Option<String>, name: &'static str) -> Result<Option<T>, ConfigError> {
    value
        .as_ref()
        .map(|value| {
            value.parse().map_err(|_| ConfigError::InvalidValue {
                name,
                value: value.clone(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_macro::map;

    fn vars(pairs: HashMap<&str, &str>) -> HashMap<String, String> {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn should_default_to_gemini() {
        // When
        let config = Config::from_vars(&vars(map! { "GOOGLE_API_KEY" => "secret" })).unwrap();

        // Then
        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.embedding_model, "models/embedding-001");
        assert_eq!(config.top_k, 4);
        assert!(config.ask_for_k);
        assert_eq!(config.distance, Distance::Euclidean);
        assert_eq!(config.timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn should_require_the_provider_key() {
        // When
        let result = Config::from_vars(&vars(map! {
            "DOCQA_PROVIDER" => "openai",
            "GOOGLE_API_KEY" => "secret"
        }));

        // Then
        assert_eq!(result.unwrap_err(), ConfigError::MissingVar("OPENAI_API_KEY"));
    }

    #[test]
    fn should_read_overrides() {
        // When
        let config = Config::from_vars(&vars(map! {
            "DOCQA_PROVIDER" => "OpenAI",
            "OPENAI_API_KEY" => "sk-test",
            "DOCQA_GENERATION_MODEL" => "gpt-4",
            "DOCQA_TOP_K" => "7",
            "DOCQA_ASK_K" => "false",
            "DOCQA_DISTANCE" => "cosine",
            "DOCQA_TIMEOUT_SECS" => "0"
        }))
        .unwrap();

        // Then
        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.embedding_model, "text-embedding-ada-002");
        assert_eq!(config.generation_model, "gpt-4");
        assert_eq!(config.top_k, 7);
        assert!(!config.ask_for_k);
        assert_eq!(config.distance, Distance::Cosine);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn should_reject_invalid_numbers() {
        // When
        let result = Config::from_vars(&vars(map! {
            "GOOGLE_API_KEY" => "secret",
            "DOCQA_TOP_K" => "many"
        }));

        // Then
        assert_eq!(
            result.unwrap_err(),
            ConfigError::InvalidValue {
                name: "DOCQA_TOP_K",
                value: "many".to_string()
            }
        );
    }
}
