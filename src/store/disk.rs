use crate::core::cache::{Cache, CacheError};
use async_trait::async_trait;
use fjall::PartitionHandle;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::{Duration, SystemTime};
use tracing::debug;

#[derive(Serialize, Deserialize)]
struct CacheEntry<V> {
    value: V,
    expires_at: Option<SystemTime>,
}

/// Cache persisted in a store partition so entries survive restarts.
pub struct DiskCache<K, V> {
    partition: PartitionHandle,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> DiskCache<K, V> {
    pub fn new(partition: PartitionHandle) -> Self {
        Self {
            partition,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for DiskCache<K, V>
where
    K: Send + Sync + Serialize + Debug + 'static,
    V: Send + Sync + Serialize + DeserializeOwned + 'static,
{
    async fn get(&self, key: &K) -> Result<Option<V>, CacheError> {
        let raw_key = serde_json::to_vec(key)?;
        let Some(raw) = self.partition.get(&raw_key)? else {
            debug!("Cache MISS for key: {:?}", key);
            return Ok(None);
        };
        let entry: CacheEntry<V> = serde_json::from_slice(&raw)?;
        if entry
            .expires_at
            .is_some_and(|expires_at| SystemTime::now() > expires_at)
        {
            debug!("Cache entry expired for key: {:?}", key);
            self.partition.remove(raw_key)?;
            return Ok(None);
        }
        debug!("Cache HIT for key: {:?}", key);
        Ok(Some(entry.value))
    }

    async fn put(&self, key: K, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|d| SystemTime::now() + d);
        let entry = CacheEntry { value, expires_at };
        self.partition
            .insert(serde_json::to_vec(&key)?, serde_json::to_vec(&entry)?)?;
        debug!("Cache PUT for key: {:?}", key);
        Ok(())
    }

    async fn remove(&self, key: &K) -> Result<(), CacheError> {
        self.partition.remove(serde_json::to_vec(key)?)?;
        debug!("Cache REMOVE for key: {:?}", key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut keys = Vec::new();
        for item in self.partition.keys() {
            keys.push(item?);
        }
        for key in keys {
            self.partition.remove(key)?;
        }
        debug!("Cache CLEAR");
        Ok(())
    }
}
