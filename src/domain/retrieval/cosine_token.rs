use super::{Candidate, CosineSimilarity, MaxResults, RetrievalStrategy, TokenSimilarity};
use crate::domain::DomainError;

/// Product of the token overlap and the cosine similarity of the embeddings
#[derive(Debug, Clone)]
pub struct CosineTokenSimilarity {
    max_results: MaxResults,
    token: TokenSimilarity,
}

impl CosineTokenSimilarity {
    pub fn new(max_results: MaxResults, token: TokenSimilarity) -> Self {
        Self { max_results, token }
    }
}

impl RetrievalStrategy for CosineTokenSimilarity {
    fn name(&self) -> &'static str {
        "cosine_token_similarity"
    }

    fn max_results(&self) -> MaxResults {
        self.max_results
    }

    fn score(&self, query: &Candidate<'_>, candidate: &Candidate<'_>) -> Result<f32, DomainError> {
        let cosine = CosineSimilarity::similarity(query.embedding, candidate.embedding)?;
        let token = self.token.score(query, candidate)?;

        Ok(token * cosine)
    }
}
