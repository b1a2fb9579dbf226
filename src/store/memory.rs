use crate::core::cache::{Cache, CacheError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct CacheValue<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheValue<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// In-process cache backed by a `HashMap` behind an async mutex.
pub struct MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<HashMap<K, CacheValue<V>>>>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Drops every expired entry.
    pub async fn purge_expired(&self) {
        let now = Instant::now();
        let mut cache = self.inner.lock().await;
        cache.retain(|_, entry| !entry.is_expired(now));
    }

    /// Stores `value` unless a live entry exists for `key`, under one lock.
    /// Returns whether the value was stored.
    pub async fn insert_if_absent(&self, key: K, value: V, ttl: Option<Duration>) -> bool {
        let now = Instant::now();
        let mut cache = self.inner.lock().await;
        if cache.get(&key).is_some_and(|entry| !entry.is_expired(now)) {
            return false;
        }
        cache.insert(
            key,
            CacheValue {
                value,
                expires_at: ttl.map(|d| now + d),
            },
        );
        true
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

impl<K, V> Default for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Result<Option<V>, CacheError> {
        let mut cache = self.inner.lock().await;
        if let Some(entry) = cache.get(key) {
            if entry.is_expired(Instant::now()) {
                debug!("Cache entry expired for key: {:?}", key);
                cache.remove(key);
                return Ok(None);
            }
            debug!("Cache HIT for key: {:?}", key);
            return Ok(Some(entry.value.clone()));
        }
        debug!("Cache MISS for key: {:?}", key);
        Ok(None)
    }

    async fn put(&self, key: K, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|duration| Instant::now() + duration);
        let cache_value = CacheValue { value, expires_at };

        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(key, cache_value);
        Ok(())
    }

    async fn remove(&self, key: &K) -> Result<(), CacheError> {
        let mut cache = self.inner.lock().await;
        cache.remove(key);
        debug!("Cache REMOVE for key: {:?}", key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut cache = self.inner.lock().await;
        cache.clear();
        debug!("Cache CLEAR");
        Ok(())
    }
}
