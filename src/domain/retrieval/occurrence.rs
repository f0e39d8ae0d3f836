use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{rank, Candidate, MaxResults, RetrievalStrategy, ScoredElement};
use crate::domain::DomainError;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").unwrap());

/// Number of distinct query words contained in the candidate content
#[derive(Debug, Clone, Default)]
pub struct OccurrenceSimilarity {
    max_results: MaxResults,
}

impl OccurrenceSimilarity {
    pub fn new(max_results: MaxResults) -> Self {
        Self { max_results }
    }

    fn query_words(content: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        NON_WORD
            .split(content)
            .filter(|word| !word.is_empty())
            .map(str::to_lowercase)
            .filter(|word| seen.insert(word.clone()))
            .collect()
    }

    fn occurrences(words: &[String], candidate: &Candidate<'_>) -> f32 {
        let content = candidate.element.content().to_lowercase();
        words.iter().filter(|word| content.contains(word.as_str())).count() as f32
    }
}

impl RetrievalStrategy for OccurrenceSimilarity {
    fn name(&self) -> &'static str {
        "occurrence_similarity"
    }

    fn max_results(&self) -> MaxResults {
        self.max_results
    }

    fn score(&self, query: &Candidate<'_>, candidate: &Candidate<'_>) -> Result<f32, DomainError> {
        let words = Self::query_words(query.element.content());
        Ok(Self::occurrences(&words, candidate))
    }

    fn find_similar_elements(
        &self,
        query: &Candidate<'_>,
        candidates: &[Candidate<'_>],
    ) -> Result<Vec<ScoredElement>, DomainError> {
        let words = Self::query_words(query.element.content());
        let scored = candidates
            .iter()
            .map(|candidate| {
                ScoredElement::new(candidate.element.clone(), Self::occurrences(&words, candidate))
            })
            .collect();

        Ok(rank(scored, self.max_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge::Element;
    use std::sync::Arc;

    fn element(id: &str, content: &str) -> Arc<Element> {
        Arc::new(Element::new(id, "t", content, 0, None, true).unwrap())
    }

    #[test]
    fn test_query_words_are_distinct_and_lowercase() {
        assert_eq!(
            OccurrenceSimilarity::query_words("(Login) login, LOGOUT!"),
            vec!["login", "logout"]
        );
    }

    #[test]
    fn test_counts_substring_occurrences() {
        let query = element("q", "Login logout session");
        let candidate = element("c", "class LoginController { void logoutUser() }");
        let strategy = OccurrenceSimilarity::default();

        let score = strategy
            .score(&Candidate::new(&query, &[]), &Candidate::new(&candidate, &[]))
            .unwrap();

        assert_eq!(score, 2.0);
    }

    #[test]
    fn test_orders_candidates() {
        let query = element("q", "export invoice");
        let none = element("none", "user login");
        let both = element("both", "InvoiceExporter");
        let one = element("one", "invoice view");
        let strategy = OccurrenceSimilarity::new(MaxResults::Unbounded);

        let results = strategy
            .find_similar_elements(
                &Candidate::new(&query, &[]),
                &[
                    Candidate::new(&none, &[]),
                    Candidate::new(&one, &[]),
                    Candidate::new(&both, &[]),
                ],
            )
            .unwrap();

        let ids: Vec<_> = results.iter().map(|r| r.element.identifier()).collect();
        assert_eq!(ids, vec!["both", "one", "none"]);
    }
}
