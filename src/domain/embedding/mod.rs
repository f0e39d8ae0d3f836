//! Embedding backend domain models and traits

mod creator;
mod provider;
mod request;
mod response;
mod tokenizer;

pub use creator::EmbeddingCreator;
pub use provider::EmbeddingProvider;
pub use request::{EmbeddingInput, EmbeddingRequest};
pub use response::{cosine_similarity, Embedding, EmbeddingResponse, EmbeddingUsage};
pub use tokenizer::TokenCounter;

#[cfg(test)]
pub use provider::mock::MockEmbeddingProvider;
#[cfg(test)]
pub use tokenizer::MockTokenCounter;
