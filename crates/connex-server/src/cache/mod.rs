//! Date-partitioned cache index
//!
//! The index maps an endpoint to the artifact already extracted for it on a
//! given calendar day. Each day is one JSON object in the blob store
//! (`index/2024-12-01.json`) holding the ordered list of entries. Artifacts
//! themselves live under `cache/{artifact_id}`.
//!
//! A partition is always rewritten whole. Writers to the same day are
//! serialized by a per-partition lock, and [`CacheIndex::record_artifact`]
//! re-reads under that lock so at most one entry per `(endpoint, date)` wins.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::storage::BlobStore;

pub mod locks;

pub use locks::KeyedLocks;

/// Key prefix of daily index partitions.
pub const INDEX_PREFIX: &str = "index/";

/// Key prefix of cached artifacts.
pub const ARTIFACT_PREFIX: &str = "cache/";

const PARTITION_SUFFIX: &str = ".json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid expiration: {0} seconds (must be greater than 0)")]
    InvalidExpiration(i64),

    #[error("Corrupt index partition {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// One cached extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub artifact_id: String,
    pub endpoint: String,
    pub date: NaiveDate,
}

#[derive(Clone)]
pub struct CacheIndex {
    store: Arc<dyn BlobStore>,
    bucket: String,
    partition_locks: KeyedLocks,
}

impl CacheIndex {
    pub fn new(store: Arc<dyn BlobStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            partition_locks: KeyedLocks::new(),
        }
    }

    pub fn partition_key(date: NaiveDate) -> String {
        format!("{}{}{}", INDEX_PREFIX, date.format("%Y-%m-%d"), PARTITION_SUFFIX)
    }

    pub fn artifact_key(artifact_id: &str) -> String {
        format!("{}{}", ARTIFACT_PREFIX, artifact_id)
    }

    /// The entry recorded for `endpoint` on `date`, if any.
    #[instrument(skip(self))]
    pub async fn lookup(
        &self,
        endpoint: &str,
        date: NaiveDate,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let entries = self.entries_for(date).await?;
        Ok(entries.into_iter().find(|entry| entry.endpoint == endpoint))
    }

    /// Record `artifact_id` as the artifact for `(endpoint, date)`.
    ///
    /// Returns the winning entry: the new one, or the one already present if
    /// another writer got there first. Existing entries are never replaced.
    #[instrument(skip(self))]
    pub async fn record_artifact(
        &self,
        artifact_id: &str,
        endpoint: &str,
        date: NaiveDate,
    ) -> Result<CacheEntry, CacheError> {
        let key = Self::partition_key(date);
        let _guard = self.partition_locks.lock(&key).await;

        let mut entries = self.entries_for(date).await?;
        if let Some(existing) = entries.iter().find(|entry| entry.endpoint == endpoint) {
            debug!(
                existing = %existing.artifact_id,
                "Entry already recorded for endpoint and date"
            );
            return Ok(existing.clone());
        }

        let entry = CacheEntry {
            artifact_id: artifact_id.to_string(),
            endpoint: endpoint.to_string(),
            date,
        };
        entries.push(entry.clone());

        let body = serde_json::to_vec(&entries).map_err(|source| CacheError::Corrupt {
            key: key.clone(),
            source,
        })?;
        self.store.put(&self.bucket, &key, body).await?;

        info!(partition = %key, entries = entries.len(), "Recorded cache entry");

        Ok(entry)
    }

    /// Signed read URL for an artifact.
    ///
    /// Rejects non-positive TTLs before touching the store.
    pub async fn signed_url_for(
        &self,
        artifact_id: &str,
        ttl_seconds: i64,
    ) -> Result<String, CacheError> {
        if ttl_seconds <= 0 {
            return Err(CacheError::InvalidExpiration(ttl_seconds));
        }

        let url = self
            .store
            .presign(
                &self.bucket,
                &Self::artifact_key(artifact_id),
                Duration::from_secs(ttl_seconds.unsigned_abs()),
            )
            .await?;

        Ok(url)
    }

    pub async fn store_artifact(&self, artifact_id: &str, body: Vec<u8>) -> Result<(), CacheError> {
        self.store
            .put(&self.bucket, &Self::artifact_key(artifact_id), body)
            .await?;
        Ok(())
    }

    /// All entries for `date`; a missing partition is empty.
    pub async fn entries_for(&self, date: NaiveDate) -> Result<Vec<CacheEntry>, CacheError> {
        let key = Self::partition_key(date);

        match self.store.get(&self.bucket, &key).await? {
            None => Ok(Vec::new()),
            Some(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt { key, source })
            },
        }
    }

    /// Days that have a partition, ascending.
    pub async fn partition_dates(&self) -> Result<Vec<NaiveDate>, CacheError> {
        let keys = self.store.list(&self.bucket).await?;

        let dates = keys
            .iter()
            .filter_map(|key| {
                let day = key.strip_prefix(INDEX_PREFIX)?.strip_suffix(PARTITION_SUFFIX)?;
                match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
                    Ok(date) => Some(date),
                    Err(_) => {
                        warn!(key = %key, "Ignoring unrecognized index object");
                        None
                    },
                }
            })
            .collect();

        Ok(dates)
    }
}
