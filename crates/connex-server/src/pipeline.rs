//! The extraction pipeline
//!
//! `lookup → (miss) extract → store artifact → record entry → signed URL`.
//!
//! Requests for the same `(endpoint, date)` are single-flighted: a second
//! caller waits for the first and is then served from the cache without
//! touching the upstream.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::cache::{CacheError, CacheIndex, KeyedLocks};
use crate::extractor::{ExtractError, Extractor};
use crate::source::{DataSource, CONNECTIONS_FIELD};

/// Default lifetime of signed artifact URLs (one day).
pub const DEFAULT_URL_TTL_SECS: i64 = 86_400;

/// Longest signed URL lifetime S3 will presign (seven days).
pub const MAX_URL_TTL_SECS: i64 = 604_800;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub artifact_id: String,
    pub url: String,
    pub cache_hit: bool,
    /// Records written; `None` when served from cache.
    pub record_count: Option<usize>,
}

#[derive(Clone)]
pub struct ExtractionService {
    source: Arc<dyn DataSource>,
    extractor: Extractor,
    cache: CacheIndex,
    url_ttl_secs: i64,
    inflight: KeyedLocks,
}

impl ExtractionService {
    pub fn new(
        source: Arc<dyn DataSource>,
        extractor: Extractor,
        cache: CacheIndex,
        url_ttl_secs: i64,
    ) -> Self {
        Self {
            source,
            extractor,
            cache,
            url_ttl_secs,
            inflight: KeyedLocks::new(),
        }
    }

    pub fn cache(&self) -> &CacheIndex {
        &self.cache
    }

    pub fn url_ttl_secs(&self) -> i64 {
        self.url_ttl_secs
    }

    /// Serve `endpoint` for `date`, extracting only on a cache miss.
    #[instrument(skip(self))]
    pub async fn run(&self, endpoint: &str, date: NaiveDate) -> Result<PipelineOutcome, PipelineError> {
        let _flight = self.inflight.lock(&format!("{}|{}", date, endpoint)).await;

        if let Some(entry) = self.cache.lookup(endpoint, date).await? {
            info!(artifact_id = %entry.artifact_id, "Cache hit");
            let url = self
                .cache
                .signed_url_for(&entry.artifact_id, self.url_ttl_secs)
                .await?;
            return Ok(PipelineOutcome {
                artifact_id: entry.artifact_id,
                url,
                cache_hit: true,
                record_count: None,
            });
        }

        info!("Cache miss, extracting");
        let extraction = self
            .extractor
            .extract(self.source.as_ref(), endpoint, None)
            .await?;
        let record_count = extraction.records.len();

        let artifact_id = Uuid::new_v4().to_string();
        let body = serde_json::to_vec(&json!({ CONNECTIONS_FIELD: extraction.records }))?;
        self.cache.store_artifact(&artifact_id, body).await?;

        let entry = self.cache.record_artifact(&artifact_id, endpoint, date).await?;
        if entry.artifact_id != artifact_id {
            warn!(
                ours = %artifact_id,
                winner = %entry.artifact_id,
                "Another writer recorded this endpoint first; serving its artifact"
            );
        }

        let url = self
            .cache
            .signed_url_for(&entry.artifact_id, self.url_ttl_secs)
            .await?;

        Ok(PipelineOutcome {
            artifact_id: entry.artifact_id,
            url,
            cache_hit: false,
            record_count: Some(record_count),
        })
    }
}
