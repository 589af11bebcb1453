//! Feature modules implementing the connex API
//!
//! Each feature is a vertical slice with its own `commands/` (writes),
//! `queries/` (reads) and `routes.rs`.
//!
//! - **data**: run extractions, inspect jobs, re-issue download URLs
//! - **cache**: browse the date-partitioned cache index

pub mod cache;
pub mod data;

use axum::Router;

use crate::jobs::JobStore;
use crate::pipeline::ExtractionService;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    pub service: ExtractionService,
    pub jobs: JobStore,
}

/// Creates the API router with all feature routes mounted
///
/// - `/data` - extraction and download
/// - `/jobs` - job status
/// - `/cache` - cache index
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest("/data", data::data_routes().with_state(state.clone()))
        .nest("/jobs", data::jobs_routes().with_state(state.clone()))
        .nest("/cache", cache::cache_routes().with_state(state.service.cache().clone()))
}
