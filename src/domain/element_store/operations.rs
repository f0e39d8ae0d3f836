//! Store reductions for quick experiment runs

use std::collections::HashSet;

use super::{ElementStore, StoreRole, StoredElement};
use crate::domain::DomainError;

/// Source store holding only its first `size` elements
pub fn reduce_source_store(
    source: &ElementStore,
    size: usize,
) -> Result<ElementStore, DomainError> {
    let mut entries = source.get_all_elements(false)?;
    entries.truncate(size);

    ElementStore::from_entries(StoreRole::Source, entries)
}

/// Target store holding only the candidates retrieved for the compared source elements
///
/// Candidates keep the order in which they were first retrieved.
pub fn reduce_target_store(
    target: &ElementStore,
    source: &ElementStore,
) -> Result<ElementStore, DomainError> {
    let strategy = target.retrieval_strategy()?.clone();
    let mut seen = HashSet::new();
    let mut entries: Vec<StoredElement> = Vec::new();

    for query in source.get_all_elements(true)? {
        for candidate in target.find_similar(&query.candidate())? {
            if !seen.insert(candidate.identifier().to_string()) {
                continue;
            }
            if let Some(entry) = target.get_by_id(candidate.identifier())? {
                entries.push(entry);
            }
        }
    }

    ElementStore::from_entries(StoreRole::Target(strategy), entries)
}
