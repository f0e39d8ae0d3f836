//! Cache domain - keys, namespace parameters and the cache abstraction

mod key;
mod parameter;
mod repository;

pub use key::{generate_local_key, CacheKey, CacheMode, NOT_APPLICABLE};
pub use parameter::{CacheParameter, ClassifierCacheParameter, EmbeddingCacheParameter};
pub use repository::{Cache, CacheExt};

#[cfg(test)]
pub use repository::mock::MockCache;
