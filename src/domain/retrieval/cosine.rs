use super::{Candidate, MaxResults, RetrievalStrategy};
use crate::domain::embedding::cosine_similarity;
use crate::domain::DomainError;

/// Cosine similarity of embeddings; vectors without magnitude score 0
#[derive(Debug, Clone, Default)]
pub struct CosineSimilarity {
    max_results: MaxResults,
}

impl CosineSimilarity {
    pub fn new(max_results: MaxResults) -> Self {
        Self { max_results }
    }

    pub(super) fn similarity(query: &[f32], candidate: &[f32]) -> Result<f32, DomainError> {
        if query.len() != candidate.len() {
            return Err(DomainError::validation(format!(
                "Cannot compare embeddings of length {} and {}",
                query.len(),
                candidate.len()
            )));
        }

        Ok(cosine_similarity(query, candidate))
    }
}

impl RetrievalStrategy for CosineSimilarity {
    fn name(&self) -> &'static str {
        "cosine_similarity"
    }

    fn max_results(&self) -> MaxResults {
        self.max_results
    }

    fn score(&self, query: &Candidate<'_>, candidate: &Candidate<'_>) -> Result<f32, DomainError> {
        Self::similarity(query.embedding, candidate.embedding)
    }
}
