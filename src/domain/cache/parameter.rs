//! Cache namespace parameters
//!
//! A parameter describes what makes one cache namespace distinct from another and is the
//! only factory for [`CacheKey`]s. Both `parameters()` and `create_cache_key()` destructure
//! every field, so a field added later does not compile until it is part of the namespace
//! name and of the key.

use serde::Serialize;

use super::key::{CacheKey, CacheMode, NOT_APPLICABLE};

/// Parameters of a chat-model cache
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifierCacheParameter {
    pub model_name: String,
    pub seed: i64,
    pub temperature: f64,
}

impl ClassifierCacheParameter {
    pub fn new(model_name: impl Into<String>, seed: i64, temperature: f64) -> Self {
        Self {
            model_name: model_name.into(),
            seed,
            temperature,
        }
    }

    /// Namespace suffix; a zero temperature is omitted to keep older cache files addressable
    pub fn parameters(&self) -> String {
        let Self {
            model_name,
            seed,
            temperature,
        } = self;

        if *temperature == 0.0 {
            format!("{}_{}", model_name, seed)
        } else {
            format!("{}_{}_{:?}", model_name, seed, temperature)
        }
    }

    pub fn create_cache_key(&self, content: &str) -> CacheKey {
        let Self {
            model_name,
            seed,
            temperature,
        } = self;

        CacheKey::new(model_name.as_str(), *seed, *temperature, CacheMode::Chat, content)
    }
}

/// Parameters of an embedding cache; embeddings are treated as deterministic per model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingCacheParameter {
    pub model_name: String,
}

impl EmbeddingCacheParameter {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
        }
    }

    pub fn parameters(&self) -> String {
        let Self { model_name } = self;
        model_name.clone()
    }

    pub fn create_cache_key(&self, content: &str) -> CacheKey {
        let Self { model_name } = self;

        CacheKey::new(
            model_name.as_str(),
            NOT_APPLICABLE,
            NOT_APPLICABLE as f64,
            CacheMode::Embedding,
            content,
        )
    }

    /// Key for the embedding of a truncated prefix of `content`
    ///
    /// Never equal to the key of the untruncated content, so an oversized input maps to its
    /// recovered embedding directly on later runs.
    pub fn create_overflow_cache_key(&self, content: &str, max_tokens: usize) -> CacheKey {
        let original = self.create_cache_key(content);
        let local_key = format!("{}_fixed_{}", original.local_key(), max_tokens);

        self.create_cache_key(&format!("(FIXED::{}): {}", max_tokens, content))
            .with_local_key(local_key)
    }
}

/// All cache namespace kinds
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheParameter {
    Classifier(ClassifierCacheParameter),
    Embedding(EmbeddingCacheParameter),
}

impl CacheParameter {
    pub fn classifier(model_name: impl Into<String>, seed: i64, temperature: f64) -> Self {
        Self::Classifier(ClassifierCacheParameter::new(model_name, seed, temperature))
    }

    pub fn embedding(model_name: impl Into<String>) -> Self {
        Self::Embedding(EmbeddingCacheParameter::new(model_name))
    }

    /// String used to name the backing store
    pub fn parameters(&self) -> String {
        match self {
            CacheParameter::Classifier(p) => p.parameters(),
            CacheParameter::Embedding(p) => p.parameters(),
        }
    }

    pub fn create_cache_key(&self, content: &str) -> CacheKey {
        match self {
            CacheParameter::Classifier(p) => p.create_cache_key(content),
            CacheParameter::Embedding(p) => p.create_cache_key(content),
        }
    }
}

impl From<ClassifierCacheParameter> for CacheParameter {
    fn from(value: ClassifierCacheParameter) -> Self {
        Self::Classifier(value)
    }
}

impl From<EmbeddingCacheParameter> for CacheParameter {
    fn from(value: EmbeddingCacheParameter) -> Self {
        Self::Embedding(value)
    }
}
