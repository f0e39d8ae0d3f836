//! Two-tier cache: shared remote tier in front of a local file mirror

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::cache::{Cache, CacheKey};
use crate::domain::DomainError;

/// Resolution of an entry that differs between the remote and the local tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Remote value is returned and overwrites the local one
    #[default]
    RemoteWins,
    /// Local value is returned and overwrites the remote one
    LocalWins,
    /// Conflicts are reported as cache errors
    Error,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::RemoteWins => write!(f, "remote_wins"),
            ConflictPolicy::LocalWins => write!(f, "local_wins"),
            ConflictPolicy::Error => write!(f, "error"),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remote_wins" | "remote" => Ok(ConflictPolicy::RemoteWins),
            "local_wins" | "local" => Ok(ConflictPolicy::LocalWins),
            "error" => Ok(ConflictPolicy::Error),
            _ => Err(DomainError::configuration(format!(
                "Unknown conflict policy: {}. Valid policies: remote_wins, local_wins, error",
                s
            ))),
        }
    }
}

/// Cache composed of an optional remote and an optional local tier
///
/// Reads prefer the remote tier and backfill whichever tier misses the entry. Remote
/// failures after construction are logged and treated as misses, so the local tier keeps
/// working when the server goes away. Reads and writes are serialized so a concurrent
/// overwrite is never mistaken for a conflict between the tiers.
#[derive(Debug)]
pub struct TieredCache {
    remote: Option<Arc<dyn Cache>>,
    local: Option<Arc<dyn Cache>>,
    policy: ConflictPolicy,
    lock: Mutex<()>,
}

impl TieredCache {
    /// Fails when neither tier is available
    pub fn new(
        remote: Option<Arc<dyn Cache>>,
        local: Option<Arc<dyn Cache>>,
        policy: ConflictPolicy,
    ) -> Result<Self, DomainError> {
        if remote.is_none() && local.is_none() {
            return Err(DomainError::configuration(
                "Neither a remote nor a local cache tier is available",
            ));
        }

        Ok(Self {
            remote,
            local,
            policy,
            lock: Mutex::new(()),
        })
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    async fn remote_get(&self, remote: &Arc<dyn Cache>, key: &CacheKey) -> Option<String> {
        match remote.get_raw(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key.local_key(), error = %e, "Remote cache read failed, using local tier");
                None
            }
        }
    }

    async fn remote_put(&self, remote: &Arc<dyn Cache>, key: &CacheKey, value: &str) {
        if let Err(e) = remote.put_raw(key, value).await {
            warn!(key = %key.local_key(), error = %e, "Remote cache write failed, skipping remote tier");
        }
    }

    async fn resolve_conflict(
        &self,
        remote: &Arc<dyn Cache>,
        local: &Arc<dyn Cache>,
        key: &CacheKey,
        remote_value: String,
        local_value: String,
    ) -> Result<Option<String>, DomainError> {
        warn!(
            key = %key.local_key(),
            policy = %self.policy,
            "Remote and local cache disagree"
        );

        match self.policy {
            ConflictPolicy::RemoteWins => {
                local.put_raw(key, &remote_value).await?;
                Ok(Some(remote_value))
            }
            ConflictPolicy::LocalWins => {
                self.remote_put(remote, key, &local_value).await;
                Ok(Some(local_value))
            }
            ConflictPolicy::Error => Err(DomainError::cache(format!(
                "Remote and local cache disagree for key '{}'",
                key.local_key()
            ))),
        }
    }
}

#[async_trait]
impl Cache for TieredCache {
    async fn get_raw(&self, key: &CacheKey) -> Result<Option<String>, DomainError> {
        let _guard = self.lock.lock().await;
        let (remote, local) = match (&self.remote, &self.local) {
            (Some(remote), Some(local)) => (remote, local),
            (Some(remote), None) => return Ok(self.remote_get(remote, key).await),
            (None, Some(local)) => return local.get_raw(key).await,
            (None, None) => return Ok(None),
        };

        let remote_value = self.remote_get(remote, key).await;
        let local_value = local.get_raw(key).await?;

        match (remote_value, local_value) {
            (None, None) => Ok(None),
            (None, Some(local_value)) => {
                debug!(key = %key.local_key(), "Backfilling remote cache from local tier");
                self.remote_put(remote, key, &local_value).await;
                Ok(Some(local_value))
            }
            (Some(remote_value), None) => {
                debug!(key = %key.local_key(), "Backfilling local cache from remote tier");
                local.put_raw(key, &remote_value).await?;
                Ok(Some(remote_value))
            }
            (Some(remote_value), Some(local_value)) if remote_value == local_value => {
                Ok(Some(remote_value))
            }
            (Some(remote_value), Some(local_value)) => {
                self.resolve_conflict(remote, local, key, remote_value, local_value)
                    .await
            }
        }
    }

    async fn put_raw(&self, key: &CacheKey, value: &str) -> Result<(), DomainError> {
        let _guard = self.lock.lock().await;
        if let Some(remote) = &self.remote {
            self.remote_put(remote, key, value).await;
        }
        if let Some(local) = &self.local {
            local.put_raw(key, value).await?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), DomainError> {
        match &self.local {
            Some(local) => local.flush().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{CacheParameter, MockCache};
    use std::time::Duration;

    fn key() -> CacheKey {
        CacheParameter::classifier("m", 1, 0.0).create_cache_key("hello")
    }

    fn tiers(remote: MockCache, local: MockCache) -> (Arc<MockCache>, Arc<MockCache>) {
        (Arc::new(remote), Arc::new(local))
    }

    fn tiered(
        remote: &Arc<MockCache>,
        local: &Arc<MockCache>,
        policy: ConflictPolicy,
    ) -> TieredCache {
        let remote: Arc<dyn Cache> = remote.clone();
        let local: Arc<dyn Cache> = local.clone();
        TieredCache::new(Some(remote), Some(local), policy).unwrap()
    }

    #[test]
    fn test_requires_a_tier() {
        assert!(TieredCache::new(None, None, ConflictPolicy::default()).is_err());
    }

    #[test]
    fn test_conflict_policy_from_str() {
        assert_eq!(
            "remote_wins".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::RemoteWins
        );
        assert_eq!("LOCAL".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::LocalWins);
        assert!("newest".parse::<ConflictPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_backfills_remote_from_local() {
        let (remote, local) = tiers(MockCache::new(), MockCache::new().with_entry(&key(), "yes"));
        let cache = tiered(&remote, &local, ConflictPolicy::RemoteWins);

        assert_eq!(cache.get_raw(&key()).await.unwrap().as_deref(), Some("yes"));
        assert_eq!(remote.raw(&key()).as_deref(), Some("yes"));
    }

    #[tokio::test]
    async fn test_backfills_local_from_remote() {
        let (remote, local) = tiers(MockCache::new().with_entry(&key(), "yes"), MockCache::new());
        let cache = tiered(&remote, &local, ConflictPolicy::RemoteWins);

        assert_eq!(cache.get_raw(&key()).await.unwrap().as_deref(), Some("yes"));
        assert_eq!(local.raw(&key()).as_deref(), Some("yes"));
    }

    #[tokio::test]
    async fn test_conflict_remote_wins() {
        let (remote, local) = tiers(
            MockCache::new().with_entry(&key(), "remote"),
            MockCache::new().with_entry(&key(), "local"),
        );
        let cache = tiered(&remote, &local, ConflictPolicy::RemoteWins);

        assert_eq!(cache.get_raw(&key()).await.unwrap().as_deref(), Some("remote"));
        assert_eq!(local.raw(&key()).as_deref(), Some("remote"));
    }

    #[tokio::test]
    async fn test_conflict_local_wins() {
        let (remote, local) = tiers(
            MockCache::new().with_entry(&key(), "remote"),
            MockCache::new().with_entry(&key(), "local"),
        );
        let cache = tiered(&remote, &local, ConflictPolicy::LocalWins);

        assert_eq!(cache.get_raw(&key()).await.unwrap().as_deref(), Some("local"));
        assert_eq!(remote.raw(&key()).as_deref(), Some("local"));
    }

    #[tokio::test]
    async fn test_conflict_error_policy() {
        let (remote, local) = tiers(
            MockCache::new().with_entry(&key(), "remote"),
            MockCache::new().with_entry(&key(), "local"),
        );
        let cache = tiered(&remote, &local, ConflictPolicy::Error);

        assert!(cache.get_raw(&key()).await.is_err());
    }

    #[tokio::test]
    async fn test_remote_failure_degrades_to_local() {
        let (remote, local) = tiers(
            MockCache::new().with_error("connection refused"),
            MockCache::new().with_entry(&key(), "yes"),
        );
        let cache = tiered(&remote, &local, ConflictPolicy::RemoteWins);

        assert_eq!(cache.get_raw(&key()).await.unwrap().as_deref(), Some("yes"));
        cache.put_raw(&key(), "no").await.unwrap();
        assert_eq!(local.raw(&key()).as_deref(), Some("no"));
    }

    #[tokio::test]
    async fn test_overwrite_during_read_is_not_a_conflict() {
        let (remote, local) = tiers(
            MockCache::new()
                .with_entry(&key(), "old")
                .with_read_delay(Duration::from_millis(50)),
            MockCache::new().with_entry(&key(), "old"),
        );
        let cache = tiered(&remote, &local, ConflictPolicy::Error);

        let read_key = key();
        let (read, written) = tokio::join!(cache.get_raw(&read_key), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cache.put_raw(&key(), "new").await
        });

        assert_eq!(read.unwrap().as_deref(), Some("old"));
        written.unwrap();
        assert_eq!(remote.raw(&key()).as_deref(), Some("new"));
        assert_eq!(local.raw(&key()).as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_flush_only_touches_local() {
        let (remote, local) = tiers(MockCache::new(), MockCache::new());
        let cache = tiered(&remote, &local, ConflictPolicy::RemoteWins);

        cache.flush().await.unwrap();

        assert_eq!(local.flushes(), 1);
        assert_eq!(remote.flushes(), 0);
    }
}
