use anyhow::{Context, Result};
use fjall::PartitionHandle;
use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;

/// JSON documents of one type stored in a partition under string keys.
pub struct DocumentCollection<T> {
    partition: PartitionHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DocumentCollection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(partition: PartitionHandle) -> Self {
        Self {
            partition,
            _marker: PhantomData,
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<T>> {
        match self.partition.get(key)? {
            Some(raw) => {
                let doc = serde_json::from_slice(&raw)
                    .with_context(|| format!("Corrupt document at key {key}"))?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    pub fn put(&self, key: &str, doc: &T) -> Result<()> {
        self.partition.insert(key, serde_json::to_vec(doc)?)?;
        Ok(())
    }

    /// Removes the document at `key`, returning whether one existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        if !self.partition.contains_key(key)? {
            return Ok(false);
        }
        self.partition.remove(key)?;
        Ok(true)
    }

    /// All documents whose key starts with `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<T>> {
        let mut docs = Vec::new();
        for item in self.partition.prefix(prefix) {
            let (_, raw) = item?;
            docs.push(serde_json::from_slice(&raw)?);
        }
        Ok(docs)
    }

    pub fn all(&self) -> Result<Vec<T>> {
        let mut docs = Vec::new();
        for item in self.partition.iter() {
            let (_, raw) = item?;
            docs.push(serde_json::from_slice(&raw)?);
        }
        Ok(docs)
    }
}
