//! Domain layer - Core traceability entities, caching contracts and algorithms

pub mod aggregation;
pub mod cache;
pub mod classifier;
pub mod element_store;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod retrieval;

pub use aggregation::{ResultAggregator, TraceLinkIdPostprocessor};
pub use cache::{Cache, CacheExt, CacheKey, CacheMode, CacheParameter};
pub use classifier::{ClassificationResult, ClassificationTask, Classifier};
pub use element_store::{ElementStore, StoreRole, StoredElement};
pub use embedding::{EmbeddingProvider, TokenCounter};
pub use error::DomainError;
pub use knowledge::{Element, TraceLink};
pub use llm::{LlmProvider, LlmRequest, LlmResponse, Message, MessageRole};
pub use retrieval::{MaxResults, RetrievalStrategy, ScoredElement};
