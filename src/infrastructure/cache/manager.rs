//! Registry handing out one cache per namespace

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tracing::{error, info, warn};

use super::local::{LocalCache, LocalCacheConfig, DEFAULT_MAX_DIRTY};
use super::redis::{RedisCache, RedisCacheConfig};
use super::tiered::{ConflictPolicy, TieredCache};
use crate::domain::cache::{Cache, CacheParameter};
use crate::domain::DomainError;

/// Configuration for the cache manager
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheManagerConfig {
    /// Directory holding all cache files
    pub directory: PathBuf,
    /// Whether to try the shared Redis tier
    pub remote_enabled: bool,
    /// Redis URL, `REDIS_URL` or the local default when unset
    pub redis_url: Option<String>,
    pub conflict_policy: ConflictPolicy,
    pub max_dirty: usize,
}

impl Default for CacheManagerConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("cache"),
            remote_enabled: false,
            redis_url: None,
            conflict_policy: ConflictPolicy::default(),
            max_dirty: DEFAULT_MAX_DIRTY,
        }
    }
}

impl CacheManagerConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }

    pub fn with_remote(mut self, redis_url: Option<String>) -> Self {
        self.remote_enabled = true;
        self.redis_url = redis_url;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_max_dirty(mut self, max_dirty: usize) -> Self {
        self.max_dirty = max_dirty;
        self
    }

    fn redis_config(&self) -> RedisCacheConfig {
        match &self.redis_url {
            Some(url) => RedisCacheConfig::new(url.clone()),
            None => RedisCacheConfig::from_env(),
        }
    }
}

struct RegisteredCache {
    parameter: CacheParameter,
    cache: Arc<dyn Cache>,
}

/// Hands out exactly one cache per `(origin, parameters)` namespace
///
/// Built once at startup and shared by reference with every component that caches model
/// responses. All namespaces live under one directory and share the remote connection.
pub struct CacheManager {
    directory: PathBuf,
    remote: Option<Arc<dyn Cache>>,
    policy: ConflictPolicy,
    max_dirty: usize,
    caches: Mutex<HashMap<String, RegisteredCache>>,
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("directory", &self.directory)
            .field("remote", &self.remote.is_some())
            .field("policy", &self.policy)
            .field("caches", &self.len())
            .finish()
    }
}

impl CacheManager {
    /// Creates the cache directory and probes the remote tier if enabled
    ///
    /// An unreachable remote is logged and the manager runs local-only.
    pub async fn new(config: CacheManagerConfig) -> Result<Self, DomainError> {
        let remote: Option<Arc<dyn Cache>> = if config.remote_enabled {
            let redis_config = config.redis_config();
            match RedisCache::connect(redis_config.clone()).await {
                Ok(cache) => {
                    info!(url = %redis_config.url, "Connected to remote cache");
                    Some(Arc::new(cache))
                }
                Err(e) => {
                    warn!(url = %redis_config.url, error = %e, "Remote cache unavailable, using local cache only");
                    None
                }
            }
        } else {
            None
        };

        Self::with_remote(config, remote)
    }

    /// Creates a manager with an already connected remote tier
    pub fn with_remote(
        config: CacheManagerConfig,
        remote: Option<Arc<dyn Cache>>,
    ) -> Result<Self, DomainError> {
        let directory = config.directory;

        if directory.exists() && !directory.is_dir() {
            return Err(DomainError::configuration(format!(
                "Cache path {} is not a directory",
                directory.display()
            )));
        }
        std::fs::create_dir_all(&directory).map_err(|e| {
            DomainError::storage(format!(
                "Failed to create cache directory {}: {}",
                directory.display(),
                e
            ))
        })?;

        Ok(Self {
            directory,
            remote,
            policy: config.conflict_policy,
            max_dirty: config.max_dirty,
            caches: Mutex::new(HashMap::new()),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.directory
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Returns the cache of a namespace, creating it on first use
    ///
    /// Asking for an existing namespace with different parameters is a configuration error.
    pub fn get_cache(
        &self,
        origin: &str,
        parameter: &CacheParameter,
    ) -> Result<Arc<dyn Cache>, DomainError> {
        let name = namespace_name(origin, parameter);
        let mut caches = self
            .caches
            .lock()
            .map_err(|_| DomainError::internal("Cache registry lock poisoned"))?;

        if let Some(existing) = caches.get(&name) {
            if existing.parameter != *parameter {
                return Err(DomainError::configuration(format!(
                    "Cache '{}' already exists with parameters {:?}, requested {:?}",
                    name, existing.parameter, parameter
                )));
            }
            return Ok(Arc::clone(&existing.cache));
        }

        let local: Arc<dyn Cache> = Arc::new(LocalCache::new(
            LocalCacheConfig::new(&self.directory, name.clone()).with_max_dirty(self.max_dirty),
        ));
        let cache: Arc<dyn Cache> =
            Arc::new(TieredCache::new(self.remote.clone(), Some(local), self.policy)?);

        info!(cache = %name, remote = self.remote.is_some(), "Created cache");
        caches.insert(
            name,
            RegisteredCache {
                parameter: parameter.clone(),
                cache: Arc::clone(&cache),
            },
        );

        Ok(cache)
    }

    /// Persists every cache created so far
    ///
    /// All caches are attempted; the first failure is returned.
    pub async fn flush(&self) -> Result<(), DomainError> {
        let caches: Vec<(String, Arc<dyn Cache>)> = {
            let caches = self
                .caches
                .lock()
                .map_err(|_| DomainError::internal("Cache registry lock poisoned"))?;
            caches
                .iter()
                .map(|(name, registered)| (name.clone(), Arc::clone(&registered.cache)))
                .collect()
        };

        let mut first_error = None;
        for (name, cache) in caches {
            if let Err(e) = cache.flush().await {
                error!(cache = %name, error = %e, "Failed to flush cache");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of namespaces created so far
    pub fn len(&self) -> usize {
        self.caches.lock().map(|caches| caches.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// File-system safe name of a namespace
fn namespace_name(origin: &str, parameter: &CacheParameter) -> String {
    format!("{}_{}", origin, parameter.parameters())
        .replace([':', '/'], "__")
}
