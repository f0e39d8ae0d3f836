//! File-backed cache tier

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::atomic_io::atomic_write;
use crate::domain::cache::{Cache, CacheKey};
use crate::domain::DomainError;

/// Default number of unsaved writes before the cache persists itself
pub const DEFAULT_MAX_DIRTY: usize = 50;

/// Configuration for a file-backed cache
#[derive(Debug, Clone)]
pub struct LocalCacheConfig {
    /// Directory holding the cache file
    pub directory: PathBuf,
    /// Namespace name, the file is `<directory>/<name>.json`
    pub name: String,
    /// Unsaved writes that trigger an automatic flush
    pub max_dirty: usize,
}

impl LocalCacheConfig {
    pub fn new(directory: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            name: name.into(),
            max_dirty: DEFAULT_MAX_DIRTY,
        }
    }

    pub fn with_max_dirty(mut self, max_dirty: usize) -> Self {
        self.max_dirty = max_dirty.max(1);
        self
    }

    pub fn file_path(&self) -> PathBuf {
        self.directory.join(format!("{}.json", self.name))
    }
}

#[derive(Debug, Default)]
struct LocalCacheState {
    entries: BTreeMap<String, String>,
    dirty: usize,
    loaded: bool,
}

/// Cache tier persisted as one JSON document
///
/// The file maps serialized cache keys to values. It is read lazily on first access and
/// rewritten atomically on flush.
#[derive(Debug)]
pub struct LocalCache {
    path: PathBuf,
    max_dirty: usize,
    state: Mutex<LocalCacheState>,
}

impl LocalCache {
    pub fn new(config: LocalCacheConfig) -> Self {
        Self {
            path: config.file_path(),
            max_dirty: config.max_dirty,
            state: Mutex::new(LocalCacheState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries, loading the file if needed
    pub fn len(&self) -> Result<usize, DomainError> {
        self.with_state(|state| Ok(state.entries.len()))
    }

    pub fn is_empty(&self) -> Result<bool, DomainError> {
        Ok(self.len()? == 0)
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut LocalCacheState) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| DomainError::internal("Local cache lock poisoned"))?;

        if !state.loaded {
            state.entries = load_entries(&self.path)?;
            state.loaded = true;
        }

        f(&mut state)
    }

    fn persist(&self, state: &mut LocalCacheState) -> Result<(), DomainError> {
        let data = serde_json::to_vec_pretty(&state.entries).map_err(|e| {
            DomainError::cache(format!("Failed to serialize {}: {}", self.path.display(), e))
        })?;

        atomic_write(&self.path, &data)?;
        debug!(path = %self.path.display(), entries = state.entries.len(), "Persisted local cache");
        state.dirty = 0;

        Ok(())
    }
}

fn load_entries(path: &Path) -> Result<BTreeMap<String, String>, DomainError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(DomainError::storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    if data.trim().is_empty() {
        warn!(path = %path.display(), "Removing blank cache file");
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "Failed to remove blank cache file");
        }
        return Ok(BTreeMap::new());
    }

    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&data).map_err(|e| {
        DomainError::cache(format!("Corrupt cache file {}: {}", path.display(), e))
    })?;

    let mut entries = BTreeMap::new();
    for (key, value) in raw {
        // Re-serialize so legacy keys match the current canonical form
        let canonical = CacheKey::from_json_key(&key)?.to_json_key()?;
        let value = match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        entries.insert(canonical, value);
    }

    info!(path = %path.display(), entries = entries.len(), "Loaded local cache");
    Ok(entries)
}

#[async_trait]
impl Cache for LocalCache {
    async fn get_raw(&self, key: &CacheKey) -> Result<Option<String>, DomainError> {
        let json_key = key.to_json_key()?;
        self.with_state(|state| Ok(state.entries.get(&json_key).cloned()))
    }

    async fn put_raw(&self, key: &CacheKey, value: &str) -> Result<(), DomainError> {
        let json_key = key.to_json_key()?;
        self.with_state(|state| {
            state.entries.insert(json_key, value.to_string());
            state.dirty += 1;

            if state.dirty > self.max_dirty {
                self.persist(state)?;
            }
            Ok(())
        })
    }

    async fn flush(&self) -> Result<(), DomainError> {
        self.with_state(|state| {
            if state.dirty == 0 {
                return Ok(());
            }
            self.persist(state)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{CacheExt, CacheParameter};
    use tempfile::TempDir;

    fn key(content: &str) -> CacheKey {
        CacheParameter::classifier("m", 1, 0.0).create_cache_key(content)
    }

    fn cache(dir: &TempDir) -> LocalCache {
        LocalCache::new(LocalCacheConfig::new(dir.path(), "Test_m_1"))
    }

    #[tokio::test]
    async fn test_put_get_without_flush() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        cache.put_raw(&key("hello"), "yes").await.unwrap();

        assert_eq!(cache.get_raw(&key("hello")).await.unwrap().as_deref(), Some("yes"));
        assert!(!cache.path().exists());
    }

    #[tokio::test]
    async fn test_flush_and_reload() {
        let dir = TempDir::new().unwrap();
        let first = cache(&dir);
        first.put_raw(&key("hello"), "yes").await.unwrap();
        first.put(&key("vector"), &vec![0.25f32, 0.5]).await.unwrap();
        first.flush().await.unwrap();

        let second = cache(&dir);

        assert_eq!(second.get_raw(&key("hello")).await.unwrap().as_deref(), Some("yes"));
        let vector: Option<Vec<f32>> = second.get(&key("vector")).await.unwrap();
        assert_eq!(vector, Some(vec![0.25, 0.5]));
    }

    #[tokio::test]
    async fn test_flush_when_clean_is_noop() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        cache.flush().await.unwrap();

        assert!(!cache.path().exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        assert!(cache.get_raw(&key("x")).await.unwrap().is_none());
        assert!(cache.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_blank_file_is_removed() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        fs::write(cache.path(), "  \n").unwrap();

        assert!(cache.get_raw(&key("x")).await.unwrap().is_none());
        assert!(!cache.path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        fs::write(cache.path(), "{not json").unwrap();

        let result = cache.get_raw(&key("x")).await;

        assert!(matches!(result, Err(DomainError::Cache { .. })));
    }

    #[tokio::test]
    async fn test_legacy_keys_are_readable() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(LocalCacheConfig::new(dir.path(), "Embedding_m"));
        fs::write(
            cache.path(),
            r#"{"{\"content\":\"abc\",\"mode\":\"EMBEDDING\",\"model\":\"m\"}": "[1.0]"}"#,
        )
        .unwrap();

        let parameter = CacheParameter::embedding("m");
        let value: Option<Vec<f32>> = cache.get(&parameter.create_cache_key("abc")).await.unwrap();

        assert_eq!(value, Some(vec![1.0]));
    }

    #[tokio::test]
    async fn test_auto_flush_after_max_dirty() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(LocalCacheConfig::new(dir.path(), "Test").with_max_dirty(2));

        cache.put_raw(&key("a"), "1").await.unwrap();
        cache.put_raw(&key("b"), "2").await.unwrap();
        assert!(!cache.path().exists());

        cache.put_raw(&key("c"), "3").await.unwrap();
        assert!(cache.path().exists());
    }

    #[tokio::test]
    async fn test_concurrent_puts() {
        let dir = TempDir::new().unwrap();
        let cache = std::sync::Arc::new(cache(&dir));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache
                        .put_raw(&key(&format!("k{}", i)), &i.to_string())
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        cache.flush().await.unwrap();

        assert_eq!(cache.len().unwrap(), 16);
    }
}
