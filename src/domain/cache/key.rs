//! Cache keys for embedding and chat responses

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::DomainError;

/// Value used for seed/temperature when the field does not apply (embeddings, legacy keys)
pub const NOT_APPLICABLE: i64 = -1;

/// Length of the hex local key
const LOCAL_KEY_LENGTH: usize = 32;

/// Kind of model call a cached value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheMode {
    Embedding,
    Chat,
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMode::Embedding => write!(f, "EMBEDDING"),
            CacheMode::Chat => write!(f, "CHAT"),
        }
    }
}

/// Key identifying one cached model response
///
/// The lookup identity is the JSON object of all fields except `local_key`, which is a
/// short content hash used for log correlation and for deriving overflow keys.
/// Keys are only built through [`super::CacheParameter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheKey {
    model: String,
    #[serde(default = "not_applicable_seed")]
    seed: i64,
    #[serde(default = "not_applicable_temperature")]
    temperature: f64,
    mode: CacheMode,
    content: String,
    #[serde(skip)]
    local_key: String,
}

fn not_applicable_seed() -> i64 {
    NOT_APPLICABLE
}

fn not_applicable_temperature() -> f64 {
    NOT_APPLICABLE as f64
}

impl CacheKey {
    pub(super) fn new(
        model: impl Into<String>,
        seed: i64,
        temperature: f64,
        mode: CacheMode,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let local_key = generate_local_key(&content);

        Self {
            model: model.into(),
            seed,
            temperature,
            mode,
            content,
            local_key,
        }
    }

    pub(super) fn with_local_key(mut self, local_key: impl Into<String>) -> Self {
        self.local_key = local_key.into();
        self
    }

    /// Parses a serialized key, filling fields missing from older formats
    pub fn from_json_key(json: &str) -> Result<Self, DomainError> {
        let key: CacheKey = serde_json::from_str(json)
            .map_err(|e| DomainError::cache(format!("Failed to parse cache key: {}", e)))?;

        Ok(key.with_local_key_from_content())
    }

    fn with_local_key_from_content(mut self) -> Self {
        self.local_key = generate_local_key(&self.content);
        self
    }

    /// Serialized lookup identity of this key
    pub fn to_json_key(&self) -> Result<String, DomainError> {
        serde_json::to_string(self)
            .map_err(|e| DomainError::cache(format!("Failed to serialize cache key: {}", e)))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn local_key(&self) -> &str {
        &self.local_key
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model
            && self.seed == other.seed
            && self.temperature.to_bits() == other.temperature.to_bits()
            && self.mode == other.mode
            && self.content == other.content
    }
}

/// Stable content hash with normalized line endings
pub fn generate_local_key(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n");
    let digest = Sha256::digest(normalized.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(LOCAL_KEY_LENGTH);
    key
}
