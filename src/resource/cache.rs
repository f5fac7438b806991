//! Read-through resource cache
//!
//! A TTL map shared by every provisioning call in the process. Entries are
//! evicted lazily: a read past expiry reports a miss and removes the stale
//! entry. Nothing sweeps in the background, so memory is bounded by the
//! number of distinct keys ever queried.

use crate::clock::{to_chrono, Clock};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Catalog entries live for a day
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Compose a cache key: `<kind>:<project>[:<zone-or-region>]`
pub fn cache_key(kind: &str, project: &str, scope: Option<&str>) -> String {
    match scope {
        Some(scope) if !scope.is_empty() => format!("{}:{}:{}", kind, project, scope),
        _ => format!("{}:{}", kind, project),
    }
}

#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

pub struct ResourceCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone + Send + Sync> ResourceCache<V> {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: to_chrono(ttl),
            clock,
        }
    }

    /// Look up a live entry. Expired entries read as misses and are dropped.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if now < entry.expires_at => return Some(entry.value.clone()),
                Some(_) => {},
            }
        }

        // A writer may have refreshed the key between the two locks
        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| now >= entry.expires_at)
        {
            entries.remove(key);
            tracing::debug!("Evicted expired cache entry {}", key);
        }
        None
    }

    /// Store a value, replacing any previous entry for the key
    pub async fn set(&self, key: impl Into<String>, value: V) {
        let expires_at = self.clock.now() + self.ttl;
        self.entries
            .write()
            .await
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Drop one key. Returns whether it was present.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Number of stored entries, including expired ones not yet read
    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn cache_with_clock(ttl: Duration) -> (Arc<ManualClock>, ResourceCache<Vec<String>>) {
        let clock = Arc::new(ManualClock::default());
        let cache = ResourceCache::new(clock.clone(), ttl);
        (clock, cache)
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(cache_key("regions", "p1", None), "regions:p1");
        assert_eq!(
            cache_key("machineTypes", "p1", Some("us-central1-a")),
            "machineTypes:p1:us-central1-a"
        );
        assert_eq!(cache_key("networks", "p1", Some("")), "networks:p1");
    }

    #[tokio::test]
    async fn test_get_returns_value_before_expiry() {
        let (clock, cache) = cache_with_clock(DEFAULT_TTL);
        cache.set("regions:p1", vec!["us-central1".to_string()]).await;

        clock.advance(DEFAULT_TTL - Duration::from_secs(1));
        assert_eq!(
            cache.get("regions:p1").await,
            Some(vec!["us-central1".to_string()])
        );
        assert_eq!(cache.get("regions:p2").await, None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_evicted_on_read_only() {
        let (clock, cache) = cache_with_clock(Duration::from_secs(60));
        cache.set("zones:p1", vec!["a".to_string()]).await;

        clock.advance(Duration::from_secs(60));
        // No sweeping: the stale entry is still stored until someone reads it
        assert_eq!(cache.len().await, 1);

        assert_eq!(cache.get("zones:p1").await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_set_refreshes_expiry() {
        let (clock, cache) = cache_with_clock(Duration::from_secs(60));
        cache.set("networks:p1", vec!["default".to_string()]).await;

        clock.advance(Duration::from_secs(50));
        cache.set("networks:p1", vec!["vpc-a".to_string()]).await;
        clock.advance(Duration::from_secs(50));

        assert_eq!(cache.get("networks:p1").await, Some(vec!["vpc-a".to_string()]));
    }

    #[tokio::test]
    async fn test_invalidate_drops_one_key() {
        let (_clock, cache) = cache_with_clock(DEFAULT_TTL);
        cache.set("a", vec![]).await;
        cache.set("b", vec![]).await;

        assert!(cache.invalidate("a").await);
        assert!(!cache.invalidate("a").await);
        assert_eq!(cache.get("b").await, Some(vec![]));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_writers_last_write_wins() {
        let (_clock, cache) = cache_with_clock(DEFAULT_TTL);
        let cache = Arc::new(cache);

        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.set("disks:p1:z", vec![format!("disk-{}", i)]).await;
                cache.get("disks:p1:z").await
            }));
        }
        for handle in handles {
            let seen = handle.await.unwrap().expect("entry should be live");
            assert_eq!(seen.len(), 1);
            assert!(seen[0].starts_with("disk-"));
        }
        assert_eq!(cache.len().await, 1);
    }
}
