//! Lexical similarity through token sequence alignment

mod sequence;
mod tokenization;

pub use sequence::{SequenceAnalysis, SequenceMatch};
pub use tokenization::Tokenization;

use super::{rank, Candidate, MaxResults, RetrievalStrategy, ScoredElement};
use crate::domain::DomainError;

pub const DEFAULT_MINIMUM_MATCH_LENGTH: usize = 1;
pub const DEFAULT_EXPONENT: f64 = 2.0;

/// Token overlap of element contents, rewarding long contiguous matches
#[derive(Debug, Clone)]
pub struct TokenSimilarity {
    max_results: MaxResults,
    tokenization: Tokenization,
    minimum_match_length: usize,
    exponent: f64,
}

impl Default for TokenSimilarity {
    fn default() -> Self {
        Self {
            max_results: MaxResults::default(),
            tokenization: Tokenization::default(),
            minimum_match_length: DEFAULT_MINIMUM_MATCH_LENGTH,
            exponent: DEFAULT_EXPONENT,
        }
    }
}

impl TokenSimilarity {
    pub fn new(
        max_results: MaxResults,
        tokenization: Tokenization,
        minimum_match_length: usize,
        exponent: f64,
    ) -> Result<Self, DomainError> {
        if minimum_match_length < 1 {
            return Err(DomainError::configuration(
                "minimum_match_length must be at least 1",
            ));
        }

        Ok(Self {
            max_results,
            tokenization,
            minimum_match_length,
            exponent,
        })
    }

    pub fn tokenization(&self) -> Tokenization {
        self.tokenization
    }

    fn score_tokens(&self, query_tokens: &[String], candidate: &Candidate<'_>) -> f32 {
        let candidate_tokens = self.tokenization.tokenize(candidate.element.content());
        SequenceAnalysis::analyze(
            query_tokens,
            &candidate_tokens,
            self.minimum_match_length,
            self.exponent,
        )
        .score() as f32
    }
}

impl RetrievalStrategy for TokenSimilarity {
    fn name(&self) -> &'static str {
        "token_similarity"
    }

    fn max_results(&self) -> MaxResults {
        self.max_results
    }

    fn score(&self, query: &Candidate<'_>, candidate: &Candidate<'_>) -> Result<f32, DomainError> {
        let query_tokens = self.tokenization.tokenize(query.element.content());
        Ok(self.score_tokens(&query_tokens, candidate))
    }

    fn find_similar_elements(
        &self,
        query: &Candidate<'_>,
        candidates: &[Candidate<'_>],
    ) -> Result<Vec<ScoredElement>, DomainError> {
        // Tokenize the query once for all candidates
        let query_tokens = self.tokenization.tokenize(query.element.content());
        let scored = candidates
            .iter()
            .map(|candidate| {
                ScoredElement::new(
                    candidate.element.clone(),
                    self.score_tokens(&query_tokens, candidate),
                )
            })
            .collect();

        Ok(rank(scored, self.max_results))
    }
}
