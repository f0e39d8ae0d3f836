//! Retrieval strategies - similarity scoring and top-k selection for target stores

mod cosine;
mod cosine_token;
mod factory;
mod max_results;
mod occurrence;
mod strategy;
mod token;

pub use cosine::CosineSimilarity;
pub use cosine_token::CosineTokenSimilarity;
pub use factory::{create_retrieval_strategy, RetrievalStrategyConfig, RetrievalStrategyKind};
pub use max_results::MaxResults;
pub use occurrence::OccurrenceSimilarity;
pub use strategy::{rank, Candidate, RetrievalStrategy, ScoredElement};
pub use token::{SequenceAnalysis, SequenceMatch, TokenSimilarity, Tokenization};
