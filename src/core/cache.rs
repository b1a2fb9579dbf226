//! Cache abstraction shared by the quote, rate and search caches.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache storage error: {0}")]
    Storage(String),
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<fjall::Error> for CacheError {
    fn from(err: fjall::Error) -> Self {
        CacheError::Storage(err.to_string())
    }
}

/// A key-value cache with optional per-entry expiry.
///
/// Expired entries read as misses. Callers treat every cache as advisory: an
/// `Err` from any method must degrade to the uncached path.
#[async_trait]
pub trait Cache<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<V>, CacheError>;
    async fn put(&self, key: K, value: V, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn remove(&self, key: &K) -> Result<(), CacheError>;
    async fn clear(&self) -> Result<(), CacheError>;
}
