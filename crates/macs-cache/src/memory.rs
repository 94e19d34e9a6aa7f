use std::time::Duration;

use moka::future::Cache;

/// In-memory hot cache backed by moka, holding decoded values.
///
/// Entries are evicted after the TTL, so a value read from SQLite is reused
/// across rounds that fall within one TTL window.
pub struct MemoryCache<V> {
    inner: Cache<String, V>,
}

impl<V> MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: String, value: V) {
        self.inner.insert(key, value).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}
