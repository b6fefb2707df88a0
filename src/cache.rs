use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

struct StoredEntry<T> {
    value: T,
    stored_at: Instant,
}

/// In-memory store of completed calculation results
///
/// Readers choose how old a result may be; entries older than the retention
/// window are evicted regardless of what readers ask for.
pub struct ResultCache<T> {
    entries: RwLock<HashMap<String, StoredEntry<T>>>,
    retention: Duration,
}

impl<T: Clone + Send + Sync> ResultCache<T> {
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Stores a value, replacing any previous entry under `key`.
    #[tracing::instrument(name = "put_cache", level = "debug", skip(self, value))]
    pub async fn put(&self, key: &str, value: T) {
        let entry = StoredEntry {
            value,
            stored_at: Instant::now(),
        };
        let mut entries = self.entries.write().await;
        let purged = Self::evict_expired(&mut entries, self.retention);
        if purged > 0 {
            tracing::debug!("Evicted {purged} expired entries on write");
        }
        entries.insert(key.to_string(), entry);
    }

    fn evict_expired(entries: &mut HashMap<String, StoredEntry<T>>, retention: Duration) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() <= retention);
        before - entries.len()
    }

    #[must_use]
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Retrieves a value stored no longer than `max_age` ago.
    /// Returns `None` for cache misses or stale entries.
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self))]
    pub async fn get(&self, key: &str, max_age: Duration) -> Option<T> {
        let max_age = max_age.min(self.retention);
        let entries = self.entries.read().await;

        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() <= max_age => {
                tracing::debug!("Key found and still fresh");
                Some(entry.value.clone())
            }
            Some(_) => {
                tracing::debug!("Key found but stale");
                None
            }
            None => {
                tracing::debug!("Key not found");
                None
            }
        }
    }

    /// Age of the entry under `key`, if any.
    pub async fn age(&self, key: &str) -> Option<Duration> {
        self.entries
            .read()
            .await
            .get(key)
            .map(|entry| entry.stored_at.elapsed())
    }

    /// Manually removes a key from the cache.
    pub async fn remove(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    /// Drops every entry older than the retention window, returning how many.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let purged = Self::evict_expired(&mut entries, self.retention);
        if purged > 0 {
            tracing::debug!("Purged {purged} expired cache entries");
        }
        purged
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<T> Debug for ResultCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entries_are_returned() {
        let cache = ResultCache::new(30 * MINUTE);
        cache.put("4106902:PR", vec![1, 2, 3]).await;

        tokio::time::advance(5 * MINUTE).await;
        assert_eq!(cache.get("4106902:PR", 10 * MINUTE).await, Some(vec![1, 2, 3]));
        assert_eq!(cache.get("4106902:PR", 2 * MINUTE).await, None);
        assert_eq!(cache.get("3550308:SP", 10 * MINUTE).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retention_caps_reader_window() {
        let cache = ResultCache::new(30 * MINUTE);
        cache.put("key", "value".to_string()).await;

        tokio::time::advance(31 * MINUTE).await;
        assert_eq!(cache.get("key", 60 * MINUTE).await, None);
        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_replaces_and_resets_age() {
        let cache = ResultCache::new(30 * MINUTE);
        cache.put("key", 1).await;
        tokio::time::advance(20 * MINUTE).await;
        cache.put("key", 2).await;

        assert_eq!(cache.age("key").await, Some(Duration::ZERO));
        assert_eq!(cache.get("key", MINUTE).await, Some(2));
        assert_eq!(cache.len().await, 1);

        cache.remove("key").await;
        assert_eq!(cache.get("key", MINUTE).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_evicts_expired_entries() {
        let cache = ResultCache::new(30 * MINUTE);
        cache.put("4106902:PR", 1).await;
        cache.put("3550308:SP", 2).await;

        tokio::time::advance(20 * MINUTE).await;
        cache.put("3304557:RJ", 3).await;
        assert_eq!(cache.len().await, 3);

        tokio::time::advance(15 * MINUTE).await;
        cache.put("2927408:BA", 4).await;
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("3304557:RJ", 30 * MINUTE).await, Some(3));
    }
}
