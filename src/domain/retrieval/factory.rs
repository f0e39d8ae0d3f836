//! Strategy registry for runtime selection

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use super::token::{DEFAULT_EXPONENT, DEFAULT_MINIMUM_MATCH_LENGTH};
use super::{
    CosineSimilarity, CosineTokenSimilarity, MaxResults, OccurrenceSimilarity, RetrievalStrategy,
    TokenSimilarity, Tokenization,
};
use crate::domain::DomainError;

/// Supported retrieval strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategyKind {
    Cosine,
    Token,
    CosineToken,
    Occurrence,
    /// Legacy name, resolved to cosine similarity
    Custom,
}

impl fmt::Display for RetrievalStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalStrategyKind::Cosine => write!(f, "cosine_similarity"),
            RetrievalStrategyKind::Token => write!(f, "token_similarity"),
            RetrievalStrategyKind::CosineToken => write!(f, "cosine_token_similarity"),
            RetrievalStrategyKind::Occurrence => write!(f, "occurrence_similarity"),
            RetrievalStrategyKind::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for RetrievalStrategyKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosine_similarity" => Ok(RetrievalStrategyKind::Cosine),
            "token_similarity" => Ok(RetrievalStrategyKind::Token),
            "cosine_token_similarity" => Ok(RetrievalStrategyKind::CosineToken),
            "occurrence_similarity" => Ok(RetrievalStrategyKind::Occurrence),
            "custom" => Ok(RetrievalStrategyKind::Custom),
            _ => Err(DomainError::configuration(format!(
                "Unknown retrieval strategy: {}. Valid strategies: cosine_similarity, \
                 token_similarity, cosine_token_similarity, occurrence_similarity",
                s
            ))),
        }
    }
}

fn default_name() -> String {
    RetrievalStrategyKind::Cosine.to_string()
}

fn default_minimum_match_length() -> usize {
    DEFAULT_MINIMUM_MATCH_LENGTH
}

fn default_exponent() -> f64 {
    DEFAULT_EXPONENT
}

/// Configuration of the retrieval strategy of a target store
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalStrategyConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub max_results: MaxResults,
    #[serde(default)]
    pub tokenization: Tokenization,
    #[serde(default = "default_minimum_match_length")]
    pub minimum_match_length: usize,
    #[serde(default = "default_exponent")]
    pub exponent: f64,
}

impl Default for RetrievalStrategyConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_results: MaxResults::default(),
            tokenization: Tokenization::default(),
            minimum_match_length: DEFAULT_MINIMUM_MATCH_LENGTH,
            exponent: DEFAULT_EXPONENT,
        }
    }
}

impl RetrievalStrategyConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_results(mut self, max_results: MaxResults) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_tokenization(mut self, tokenization: Tokenization) -> Self {
        self.tokenization = tokenization;
        self
    }

    fn token_similarity(&self) -> Result<TokenSimilarity, DomainError> {
        TokenSimilarity::new(
            self.max_results,
            self.tokenization,
            self.minimum_match_length,
            self.exponent,
        )
    }
}

/// Builds the strategy named in the configuration
pub fn create_retrieval_strategy(
    config: &RetrievalStrategyConfig,
) -> Result<Arc<dyn RetrievalStrategy>, DomainError> {
    let kind: RetrievalStrategyKind = config.name.parse()?;

    let strategy: Arc<dyn RetrievalStrategy> = match kind {
        RetrievalStrategyKind::Cosine => Arc::new(CosineSimilarity::new(config.max_results)),
        RetrievalStrategyKind::Custom => {
            warn!("For backwards compatibility: using cosine similarity as retrieval strategy");
            Arc::new(CosineSimilarity::new(config.max_results))
        }
        RetrievalStrategyKind::Token => Arc::new(config.token_similarity()?),
        RetrievalStrategyKind::CosineToken => Arc::new(CosineTokenSimilarity::new(
            config.max_results,
            config.token_similarity()?,
        )),
        RetrievalStrategyKind::Occurrence => {
            Arc::new(OccurrenceSimilarity::new(config.max_results))
        }
    };

    Ok(strategy)
}
