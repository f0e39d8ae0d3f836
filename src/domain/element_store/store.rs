use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::knowledge::Element;
use crate::domain::retrieval::{Candidate, RetrievalStrategy, ScoredElement};
use crate::domain::DomainError;

/// Role of an element store in the matching problem
#[derive(Debug, Clone)]
pub enum StoreRole {
    /// Hands out its elements for comparison
    Source,
    /// Answers similarity queries through a retrieval strategy
    Target(Arc<dyn RetrievalStrategy>),
}

impl fmt::Display for StoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreRole::Source => write!(f, "source"),
            StoreRole::Target(strategy) => write!(f, "target ({})", strategy.name()),
        }
    }
}

/// An element with a copy of its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct StoredElement {
    pub element: Arc<Element>,
    pub embedding: Vec<f32>,
}

impl StoredElement {
    pub fn candidate(&self) -> Candidate<'_> {
        Candidate::new(&self.element, &self.embedding)
    }
}

/// Elements of one side with their embeddings
///
/// Set up exactly once and read-only afterwards. The store owns its embedding buffers;
/// every read hands out a copy.
#[derive(Debug)]
pub struct ElementStore {
    role: StoreRole,
    entries: Vec<StoredElement>,
    index: HashMap<String, usize>,
    initialized: bool,
}

impl ElementStore {
    pub fn source() -> Self {
        Self::with_role(StoreRole::Source)
    }

    pub fn target(strategy: Arc<dyn RetrievalStrategy>) -> Self {
        Self::with_role(StoreRole::Target(strategy))
    }

    pub fn with_role(role: StoreRole) -> Self {
        Self {
            role,
            entries: Vec::new(),
            index: HashMap::new(),
            initialized: false,
        }
    }

    /// Builds and sets up a store in one step
    pub fn from_entries(role: StoreRole, entries: Vec<StoredElement>) -> Result<Self, DomainError> {
        let (elements, embeddings) = entries
            .into_iter()
            .map(|entry| (entry.element, entry.embedding))
            .unzip();

        let mut store = Self::with_role(role);
        store.setup(elements, embeddings)?;
        Ok(store)
    }

    /// One-time initialization with elements and their embeddings in the same order
    pub fn setup(
        &mut self,
        elements: Vec<Arc<Element>>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<(), DomainError> {
        if self.initialized {
            return Err(DomainError::validation("The element store is already set up"));
        }
        if elements.len() != embeddings.len() {
            return Err(DomainError::validation(format!(
                "The number of elements ({}) and embeddings ({}) must be equal",
                elements.len(),
                embeddings.len()
            )));
        }

        for (element, embedding) in elements.into_iter().zip(embeddings) {
            self.index
                .insert(element.identifier().to_string(), self.entries.len());
            self.entries.push(StoredElement { element, embedding });
        }
        self.initialized = true;

        Ok(())
    }

    pub fn role(&self) -> &StoreRole {
        &self.role
    }

    pub fn is_target(&self) -> bool {
        matches!(self.role, StoreRole::Target(_))
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_initialized(&self) -> Result<(), DomainError> {
        if !self.initialized {
            return Err(DomainError::validation("The element store is not set up"));
        }
        Ok(())
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<StoredElement>, DomainError> {
        self.ensure_initialized()?;
        Ok(self.index.get(id).map(|&i| self.entries[i].clone()))
    }

    /// Direct children of `parent_id`
    pub fn get_elements_by_parent_id(
        &self,
        parent_id: &str,
    ) -> Result<Vec<StoredElement>, DomainError> {
        self.ensure_initialized()?;
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.element.parent_id() == Some(parent_id))
            .cloned()
            .collect())
    }

    /// All elements in setup order
    pub fn all_elements(&self) -> Result<Vec<Arc<Element>>, DomainError> {
        self.ensure_initialized()?;
        Ok(self.entries.iter().map(|e| Arc::clone(&e.element)).collect())
    }

    /// All elements with their embeddings, optionally only those flagged for comparison
    ///
    /// Source stores only.
    pub fn get_all_elements(&self, only_compare: bool) -> Result<Vec<StoredElement>, DomainError> {
        if self.is_target() {
            return Err(DomainError::configuration(
                "get_all_elements with embeddings is only available on source stores",
            ));
        }
        self.ensure_initialized()?;

        Ok(self
            .entries
            .iter()
            .filter(|entry| !only_compare || entry.element.compare())
            .cloned()
            .collect())
    }

    pub fn retrieval_strategy(&self) -> Result<&Arc<dyn RetrievalStrategy>, DomainError> {
        match &self.role {
            StoreRole::Target(strategy) => Ok(strategy),
            StoreRole::Source => Err(DomainError::configuration(
                "Source stores have no retrieval strategy",
            )),
        }
    }

    /// Elements similar to `query`, most similar first
    ///
    /// Target stores only; searches the elements flagged for comparison.
    pub fn find_similar(&self, query: &Candidate<'_>) -> Result<Vec<Arc<Element>>, DomainError> {
        Ok(self
            .find_similar_with_distances(query)?
            .into_iter()
            .map(|scored| scored.element)
            .collect())
    }

    pub fn find_similar_with_distances(
        &self,
        query: &Candidate<'_>,
    ) -> Result<Vec<ScoredElement>, DomainError> {
        let strategy = self.retrieval_strategy()?;
        self.ensure_initialized()?;

        let candidates: Vec<Candidate<'_>> = self
            .entries
            .iter()
            .filter(|entry| entry.element.compare())
            .map(StoredElement::candidate)
            .collect();

        strategy.find_similar_elements(query, &candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::retrieval::{CosineSimilarity, MaxResults};

    fn element(id: &str, compare: bool) -> Arc<Element> {
        Arc::new(Element::new(id, "t", id, 0, None, compare).unwrap())
    }

    fn target(max_results: usize) -> ElementStore {
        ElementStore::target(Arc::new(CosineSimilarity::new(
            MaxResults::limited(max_results).unwrap(),
        )))
    }

    #[test]
    fn test_setup_twice_fails() {
        let mut store = ElementStore::source();
        store.setup(vec![element("a", true)], vec![vec![1.0]]).unwrap();

        let result = store.setup(vec![element("b", true)], vec![vec![1.0]]);

        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_setup_length_mismatch() {
        let mut store = ElementStore::source();

        let result = store.setup(vec![element("a", true)], vec![]);

        assert!(result.is_err());
        assert!(!store.is_initialized());
    }

    #[test]
    fn test_reads_before_setup_fail() {
        let store = ElementStore::source();
        assert!(store.get_by_id("a").is_err());
    }

    #[test]
    fn test_get_by_id_returns_copy() {
        let mut store = ElementStore::source();
        store.setup(vec![element("a", true)], vec![vec![1.0, 2.0]]).unwrap();

        let mut copy = store.get_by_id("a").unwrap().unwrap();
        copy.embedding[0] = 99.0;

        assert_eq!(store.get_by_id("a").unwrap().unwrap().embedding, vec![1.0, 2.0]);
        assert!(store.get_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_get_elements_by_parent_id() {
        let parent = element("doc", false);
        let child = Arc::new(Element::from_parent(&parent, 0, "x", true).unwrap());
        let mut store = ElementStore::source();
        store
            .setup(vec![parent, child], vec![vec![1.0], vec![2.0]])
            .unwrap();

        let children = store.get_elements_by_parent_id("doc").unwrap();

        assert_eq!(children.len(), 1);
        assert_eq!(children[0].element.identifier(), "doc$0");
    }

    #[test]
    fn test_source_only_compare_filter() {
        let mut store = ElementStore::source();
        store
            .setup(
                vec![element("a", true), element("b", false)],
                vec![vec![1.0], vec![1.0]],
            )
            .unwrap();

        assert_eq!(store.get_all_elements(false).unwrap().len(), 2);
        assert_eq!(store.get_all_elements(true).unwrap().len(), 1);
    }

    #[test]
    fn test_role_violations_fail() {
        let mut source = ElementStore::source();
        source.setup(vec![element("a", true)], vec![vec![1.0]]).unwrap();
        let mut target = target(1);
        target.setup(vec![element("a", true)], vec![vec![1.0]]).unwrap();
        let query = element("q", true);

        assert!(matches!(
            source.find_similar(&Candidate::new(&query, &[1.0])),
            Err(DomainError::Configuration { .. })
        ));
        assert!(matches!(
            target.get_all_elements(false),
            Err(DomainError::Configuration { .. })
        ));
        assert_eq!(target.all_elements().unwrap().len(), 1);
    }

    #[test]
    fn test_find_similar_top_two() {
        let mut store = target(2);
        store
            .setup(
                vec![element("low", true), element("high", true), element("mid", true)],
                vec![vec![0.2, 0.98], vec![0.9, 0.44], vec![0.5, 0.87]],
            )
            .unwrap();
        let query = element("q", true);

        let results = store
            .find_similar_with_distances(&Candidate::new(&query, &[1.0, 0.0]))
            .unwrap();

        let ids: Vec<_> = results.iter().map(|r| r.element.identifier()).collect();
        assert_eq!(ids, vec!["high", "mid"]);
    }

    #[test]
    fn test_find_similar_skips_non_compare_elements() {
        let mut store = target(10);
        store
            .setup(
                vec![element("a", false), element("b", true)],
                vec![vec![1.0], vec![1.0]],
            )
            .unwrap();
        let query = element("q", true);

        let results = store.find_similar(&Candidate::new(&query, &[1.0])).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].identifier(), "b");
    }
}
