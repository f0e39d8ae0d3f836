//! Element stores - one side of the matching problem with its embeddings

mod operations;
mod store;

pub use operations::{reduce_source_store, reduce_target_store};
pub use store::{ElementStore, StoreRole, StoredElement};
