//! Connex Server Library
//!
//! Pulls time-ordered connection records from an upstream source, fills
//! gaps at the leading edge, deduplicates, and caches the result per
//! endpoint and day behind signed URLs.
//!
//! # Overview
//!
//! - **Extractor**: fetch, gap detection and bounded backfill
//! - **Cache**: date-partitioned, write-once index over a blob store
//! - **Pipeline**: single-flighted `lookup → extract → store → sign`
//! - **API**: axum routes for extraction, jobs, downloads and the index
//! - **Storage**: S3/MinIO or in-memory blob stores
//!
//! # Example
//!
//! ```no_run
//! use connex_server::{api, config::Config, jobs::JobStore, storage};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let storage_config = storage::StorageConfig::from_env()?;
//!     let service = connex_server::build_service(&config, &storage_config).await?;
//!     let jobs = JobStore::with_retention(config.jobs.to_retention());
//!     let state = api::AppState::new(service, jobs);
//!     api::serve(config, state).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod extractor;
pub mod features;
pub mod jobs;
pub mod middleware;
pub mod pipeline;
pub mod source;
pub mod storage;

use std::sync::Arc;

// Re-export commonly used types
pub use error::AppError;
pub use pipeline::{ExtractionService, PipelineOutcome};

/// Wire the HTTP source, blob store and cache index into a service.
pub async fn build_service(
    config: &config::Config,
    storage_config: &storage::StorageConfig,
) -> anyhow::Result<ExtractionService> {
    let store = storage::init(storage_config).await?;
    let source = source::HttpDataSource::new(&config.source)?;
    let cache = cache::CacheIndex::new(store, storage_config.bucket.clone());

    Ok(ExtractionService::new(
        Arc::new(source),
        extractor::Extractor::new(config.extractor.to_extractor_config()),
        cache,
        config.cache.url_ttl_secs,
    ))
}
