//! Cache infrastructure - file, Redis and tiered caches plus the namespace registry

mod atomic_io;
mod local;
mod manager;
mod redis;
mod tiered;

pub use local::{LocalCache, LocalCacheConfig, DEFAULT_MAX_DIRTY};
pub use manager::{CacheManager, CacheManagerConfig};
pub use redis::{RedisCache, RedisCacheConfig, DEFAULT_REDIS_URL};
pub use tiered::{ConflictPolicy, TieredCache};
