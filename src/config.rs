//! Runtime configuration.
//!
//! Values come from defaults, then environment variables. The binary layers
//! command-line flags on top.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::answer::{DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL};
use crate::embedding::DEFAULT_EMBEDDING_DIM;
use crate::error::ConfigError;
use crate::graph::vocab::{DEFAULT_ENTITY_NAMESPACE, DEFAULT_ONTOLOGY_NAMESPACE};

/// Default SPARQL endpoint for the entity source.
pub const DEFAULT_SPARQL_ENDPOINT: &str = "https://dbpedia.org/sparql";

/// Default timeout for every outbound request.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of facts retrieved per question.
pub const DEFAULT_TOP_K: usize = 8;

/// Environment variable names.
pub mod env {
    /// SPARQL endpoint.
    pub const SPARQL_ENDPOINT: &str = "PROVKG_SPARQL_ENDPOINT";
    /// Namespace for minted entities.
    pub const ENTITY_NAMESPACE: &str = "PROVKG_ENTITY_NAMESPACE";
    /// Language model base URL.
    pub const LLM_ENDPOINT: &str = "PROVKG_LLM_ENDPOINT";
    /// Language model name.
    pub const LLM_MODEL: &str = "PROVKG_LLM_MODEL";
    /// Language model API key.
    pub const API_KEY: &str = "GEMINI_API_KEY";
    /// Request timeout in seconds.
    pub const TIMEOUT_SECS: &str = "PROVKG_TIMEOUT_SECS";
    /// Embedding provider: `lexical` or `fastembed`.
    pub const EMBEDDER: &str = "PROVKG_EMBEDDER";
    /// Embedding dimensionality.
    pub const EMBEDDING_DIM: &str = "PROVKG_EMBEDDING_DIM";
    /// Retrieval depth.
    pub const TOP_K: &str = "PROVKG_TOP_K";
}

/// Which [`crate::embedding::Embedder`] the pipeline builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderKind {
    /// Offline feature hashing at `embedding_dim`.
    #[default]
    Lexical,
    /// Local `all-MiniLM-L6-v2`. Needs the `fastembed` feature; ignores
    /// `embedding_dim`.
    FastEmbed,
}

impl fmt::Display for EmbedderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lexical => "lexical",
            Self::FastEmbed => "fastembed",
        })
    }
}

impl FromStr for EmbedderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lexical" => Ok(Self::Lexical),
            "fastembed" => Ok(Self::FastEmbed),
            _ => Err(ConfigError::InvalidValue {
                key: env::EMBEDDER.to_string(),
                value: s.to_string(),
                reason: "expected `lexical` or `fastembed`".to_string(),
            }),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// SPARQL endpoint queried by `fetch`.
    pub sparql_endpoint: String,
    /// Namespace for minted entity identifiers.
    pub entity_namespace: String,
    /// Namespace of the provenance predicates and the class.
    pub ontology_namespace: String,
    /// Language model base URL.
    pub llm_endpoint: String,
    /// Language model name.
    pub llm_model: String,
    /// Language model API key. Never serialized.
    #[serde(skip)]
    pub llm_api_key: Option<String>,
    /// Timeout for outbound requests.
    pub request_timeout: Duration,
    /// Embedding provider.
    #[serde(default)]
    pub embedder: EmbedderKind,
    /// Embedding dimensionality.
    pub embedding_dim: usize,
    /// Facts retrieved per question.
    pub top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sparql_endpoint: DEFAULT_SPARQL_ENDPOINT.to_string(),
            entity_namespace: DEFAULT_ENTITY_NAMESPACE.to_string(),
            ontology_namespace: DEFAULT_ONTOLOGY_NAMESPACE.to_string(),
            llm_endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            llm_model: DEFAULT_GEMINI_MODEL.to_string(),
            llm_api_key: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            embedder: EmbedderKind::Lexical,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            top_k: DEFAULT_TOP_K,
        }
    }
}

fn parse_positive<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let value: T = raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })?;
    if value == T::default() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for unparsable or zero numbers
    /// or an unknown embedder.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, falling back to defaults.
    ///
    /// Blank values count as unset.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for unparsable or zero numbers
    /// or an unknown embedder.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get(env::SPARQL_ENDPOINT) {
            config.sparql_endpoint = v;
        }
        if let Some(v) = get(env::ENTITY_NAMESPACE) {
            config.entity_namespace = v;
        }
        if let Some(v) = get(env::LLM_ENDPOINT) {
            config.llm_endpoint = v;
        }
        if let Some(v) = get(env::LLM_MODEL) {
            config.llm_model = v;
        }
        config.llm_api_key = get(env::API_KEY).map(|v| v.trim().to_string());
        if let Some(v) = get(env::TIMEOUT_SECS) {
            config.request_timeout = Duration::from_secs(parse_positive(env::TIMEOUT_SECS, &v)?);
        }
        if let Some(v) = get(env::EMBEDDER) {
            config.embedder = v.parse()?;
        }
        if let Some(v) = get(env::EMBEDDING_DIM) {
            config.embedding_dim = parse_positive(env::EMBEDDING_DIM, &v)?;
        }
        if let Some(v) = get(env::TOP_K) {
            config.top_k = parse_positive(env::TOP_K, &v)?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let c = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(c, Config::default());
        assert_eq!(c.top_k, 8);
        assert_eq!(c.request_timeout, Duration::from_secs(30));
        assert_eq!(c.llm_model, "gemini-2.0-flash");
        assert_eq!(c.embedder, EmbedderKind::Lexical);
        assert!(c.llm_api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let c = Config::from_lookup(lookup(&[
            (env::SPARQL_ENDPOINT, "http://localhost:3030/vn/query"),
            (env::TOP_K, " 3 "),
            (env::EMBEDDING_DIM, "128"),
            (env::TIMEOUT_SECS, "5"),
            (env::API_KEY, "secret"),
        ]))
        .unwrap();
        assert_eq!(c.sparql_endpoint, "http://localhost:3030/vn/query");
        assert_eq!(c.top_k, 3);
        assert_eq!(c.embedding_dim, 128);
        assert_eq!(c.request_timeout, Duration::from_secs(5));
        assert_eq!(c.llm_api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_embedder_selection() {
        let c = Config::from_lookup(lookup(&[(env::EMBEDDER, " FastEmbed ")])).unwrap();
        assert_eq!(c.embedder, EmbedderKind::FastEmbed);
        let c = Config::from_lookup(lookup(&[(env::EMBEDDER, "lexical")])).unwrap();
        assert_eq!(c.embedder, EmbedderKind::Lexical);

        let err = Config::from_lookup(lookup(&[(env::EMBEDDER, "word2vec")])).unwrap_err();
        assert!(format!("{err}").contains(env::EMBEDDER));
        assert_eq!(EmbedderKind::FastEmbed.to_string(), "fastembed");
    }

    #[test]
    fn test_blank_key_is_none() {
        let c = Config::from_lookup(lookup(&[(env::API_KEY, "  ")])).unwrap();
        assert!(c.llm_api_key.is_none());
    }

    #[test]
    fn test_invalid_numbers() {
        let err = Config::from_lookup(lookup(&[(env::TOP_K, "many")])).unwrap_err();
        assert!(format!("{err}").contains(env::TOP_K));
        assert!(Config::from_lookup(lookup(&[(env::EMBEDDING_DIM, "0")])).is_err());
    }

    #[test]
    fn test_key_not_serialized() {
        let c = Config {
            llm_api_key: Some("secret".into()),
            ..Config::default()
        };
        let json = serde_json::to_string(&c).unwrap();
        assert!(!json.contains("secret"));
    }
}
