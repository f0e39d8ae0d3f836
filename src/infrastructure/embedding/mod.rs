//! Embedding creation and backends

mod cached;
mod factory;
mod mock;
mod openai;
mod tokenizer;

pub use cached::{
    CachedEmbeddingCreator, EmbeddingBackendFactory, DEFAULT_MAX_TOKEN_LENGTH, EMBEDDING_TIMEOUT,
};
pub use factory::{create_cached_embedding_creator, create_embedding_creator, EmbeddingCreatorConfig};
pub use mock::MockEmbeddingCreator;
pub use openai::OpenAiEmbeddingProvider;
pub use tokenizer::TiktokenCounter;
