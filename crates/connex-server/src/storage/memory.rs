//! In-process [`BlobStore`]

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::BlobStore;

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct StoreCalls {
    pub put: AtomicUsize,
    pub get: AtomicUsize,
    pub list: AtomicUsize,
    pub presign: AtomicUsize,
}

impl StoreCalls {
    pub fn total(&self) -> usize {
        self.put.load(Ordering::SeqCst)
            + self.get.load(Ordering::SeqCst)
            + self.list.load(Ordering::SeqCst)
            + self.presign.load(Ordering::SeqCst)
    }
}

/// Blob store backed by a map of `(bucket, key)`.
///
/// Presigned URLs have the shape `memory://{bucket}/{key}?expires_in={secs}`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<(String, String), Vec<u8>>>>,
    calls: Arc<StoreCalls>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &StoreCalls {
        &self.calls
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        self.calls.put.fetch_add(1, Ordering::SeqCst);
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()), data);
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned())
    }

    async fn list(&self, bucket: &str) -> Result<BTreeSet<String>> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, key)| key.clone())
            .collect())
    }

    async fn presign(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String> {
        self.calls.presign.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "memory://{}/{}?expires_in={}",
            bucket,
            key,
            expires_in.as_secs()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("b", "nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_bucket() {
        let store = MemoryStore::new();
        store.put("a", "one", vec![1]).await.unwrap();
        store.put("a", "two", vec![2]).await.unwrap();
        store.put("b", "three", vec![3]).await.unwrap();

        let keys = store.list("a").await.unwrap();
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["one", "two"]);
        assert_eq!(store.calls().put.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_presign_shape() {
        let store = MemoryStore::new();
        let url = store
            .presign("b", "cache/x", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(url, "memory://b/cache/x?expires_in=30");
        assert_eq!(store.calls().total(), 1);
    }
}
