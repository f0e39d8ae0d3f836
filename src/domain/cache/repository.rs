//! Cache trait definition

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use super::CacheKey;
use crate::domain::DomainError;

/// Key-value cache for model responses
///
/// Values are strings: chat responses are stored as-is, other values as JSON.
/// Use [`CacheExt`] for typed access. Implementations are shared across workers and
/// must synchronize internally.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Gets a raw value from the cache
    async fn get_raw(&self, key: &CacheKey) -> Result<Option<String>, DomainError>;

    /// Inserts or overwrites a raw value
    async fn put_raw(&self, key: &CacheKey, value: &str) -> Result<(), DomainError>;

    /// Checks if a key exists in the cache
    async fn contains(&self, key: &CacheKey) -> Result<bool, DomainError> {
        Ok(self.get_raw(key).await?.is_some())
    }

    /// Persists pending writes; a no-op when nothing changed
    async fn flush(&self) -> Result<(), DomainError>;
}

/// Extension trait providing typed get/put operations
pub trait CacheExt: Cache {
    /// Gets a typed value from the cache
    fn get<'a, V>(
        &'a self,
        key: &'a CacheKey,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get_raw(key).await? {
                Some(data) => {
                    let value: V = serde_json::from_str(&data).map_err(|e| {
                        DomainError::cache(format!(
                            "Failed to deserialize cache value for '{}': {}",
                            key.local_key(),
                            e
                        ))
                    })?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    /// Puts a typed value into the cache
    fn put<'a, V>(
        &'a self,
        key: &'a CacheKey,
        value: &'a V,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync + ?Sized,
    {
        async move {
            let data = serde_json::to_string(value).map_err(|e| {
                DomainError::cache(format!("Failed to serialize cache value: {}", e))
            })?;
            self.put_raw(key, &data).await
        }
    }
}

// Blanket implementation for all types implementing Cache
impl<T: Cache + ?Sized> CacheExt for T {}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mock cache for testing, counts every call
    #[derive(Debug, Default)]
    pub struct MockCache {
        entries: Mutex<HashMap<String, String>>,
        error: Mutex<Option<String>>,
        gets: AtomicUsize,
        puts: AtomicUsize,
        flushes: AtomicUsize,
        read_delay: Option<Duration>,
    }

    impl MockCache {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_entry(self, key: &CacheKey, value: &str) -> Self {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_json_key().unwrap(), value.to_string());
            self
        }

        pub fn with_error(self, error: impl Into<String>) -> Self {
            *self.error.lock().unwrap() = Some(error.into());
            self
        }

        /// Reads capture the value first, then wait like a slow network round trip
        pub fn with_read_delay(mut self, delay: Duration) -> Self {
            self.read_delay = Some(delay);
            self
        }

        pub fn set_error(&self, error: Option<String>) {
            *self.error.lock().unwrap() = error;
        }

        pub fn raw(&self, key: &CacheKey) -> Option<String> {
            self.entries
                .lock()
                .unwrap()
                .get(&key.to_json_key().unwrap())
                .cloned()
        }

        pub fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }

        pub fn gets(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }

        pub fn puts(&self) -> usize {
            self.puts.load(Ordering::SeqCst)
        }

        pub fn flushes(&self) -> usize {
            self.flushes.load(Ordering::SeqCst)
        }

        fn check_error(&self) -> Result<(), DomainError> {
            if let Some(error) = self.error.lock().unwrap().clone() {
                return Err(DomainError::cache(error));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Cache for MockCache {
        async fn get_raw(&self, key: &CacheKey) -> Result<Option<String>, DomainError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.check_error()?;
            let value = self.entries.lock().unwrap().get(&key.to_json_key()?).cloned();
            if let Some(delay) = self.read_delay {
                tokio::time::sleep(delay).await;
            }

            Ok(value)
        }

        async fn put_raw(&self, key: &CacheKey, value: &str) -> Result<(), DomainError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.check_error()?;
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_json_key()?, value.to_string());
            Ok(())
        }

        async fn flush(&self) -> Result<(), DomainError> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            self.check_error()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::domain::cache::CacheParameter;

        fn key(content: &str) -> CacheKey {
            CacheParameter::embedding("mock-embedding").create_cache_key(content)
        }

        #[tokio::test]
        async fn test_mock_cache_typed_put_get() {
            let cache = MockCache::new();
            cache.put(&key("a"), &vec![0.5f32, 1.0]).await.unwrap();

            let result: Option<Vec<f32>> = cache.get(&key("a")).await.unwrap();
            assert_eq!(result, Some(vec![0.5, 1.0]));
            assert_eq!(cache.raw(&key("a")).as_deref(), Some("[0.5,1.0]"));
        }

        #[tokio::test]
        async fn test_mock_cache_get_missing() {
            let cache = MockCache::new();

            let result: Option<Vec<f32>> = cache.get(&key("missing")).await.unwrap();
            assert!(result.is_none());
            assert!(!cache.contains(&key("missing")).await.unwrap());
        }

        #[tokio::test]
        async fn test_mock_cache_corrupt_value() {
            let cache = MockCache::new().with_entry(&key("a"), "not a vector");

            let result: Result<Option<Vec<f32>>, _> = cache.get(&key("a")).await;
            assert!(matches!(result, Err(DomainError::Cache { .. })));
        }

        #[tokio::test]
        async fn test_mock_cache_with_error() {
            let cache = MockCache::new().with_error("Test error");

            let result = cache.get_raw(&key("a")).await;
            assert!(result.is_err());
        }
    }
}
