//! Retrieval strategy trait

use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::Arc;

use super::MaxResults;
use crate::domain::knowledge::Element;
use crate::domain::DomainError;

/// An element together with its embedding, as held by an element store
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub element: &'a Arc<Element>,
    pub embedding: &'a [f32],
}

impl<'a> Candidate<'a> {
    pub fn new(element: &'a Arc<Element>, embedding: &'a [f32]) -> Self {
        Self { element, embedding }
    }
}

/// A retrieved element and its similarity to the query
#[derive(Debug, Clone)]
pub struct ScoredElement {
    pub element: Arc<Element>,
    pub score: f32,
}

impl ScoredElement {
    pub fn new(element: Arc<Element>, score: f32) -> Self {
        Self { element, score }
    }
}

/// Similarity search over the elements of a target store
///
/// Strategies only differ in [`RetrievalStrategy::score`]; ordering and truncation are
/// shared through [`rank`].
pub trait RetrievalStrategy: Send + Sync + Debug {
    /// Registry name of the strategy
    fn name(&self) -> &'static str;

    fn max_results(&self) -> MaxResults;

    /// Similarity of `candidate` to `query`, higher is more similar
    fn score(&self, query: &Candidate<'_>, candidate: &Candidate<'_>) -> Result<f32, DomainError>;

    /// Candidates ordered by descending score, truncated to `max_results`
    fn find_similar_elements(
        &self,
        query: &Candidate<'_>,
        candidates: &[Candidate<'_>],
    ) -> Result<Vec<ScoredElement>, DomainError> {
        let scored = candidates
            .iter()
            .map(|candidate| {
                Ok(ScoredElement::new(
                    Arc::clone(candidate.element),
                    self.score(query, candidate)?,
                ))
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(rank(scored, self.max_results()))
    }
}

/// Stable sort by descending score, then truncation; ties keep their input order
pub fn rank(mut scored: Vec<ScoredElement>, max_results: MaxResults) -> Vec<ScoredElement> {
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(max_results.cap(scored.len()));
    scored
}
