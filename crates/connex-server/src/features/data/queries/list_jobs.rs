//! List jobs query

use serde::{Deserialize, Serialize};

use crate::jobs::{Job, JobStatus, JobStore};

/// Default number of jobs returned per page.
pub const DEFAULT_LIMIT: usize = 50;

/// Upper bound on `limit`.
pub const MAX_LIMIT: usize = 500;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<JobStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

pub async fn handle(jobs: &JobStore, query: ListJobsQuery) -> ListJobsResponse {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let all = jobs.list(query.status).await;
    let total = all.len();
    let page = all.into_iter().skip(offset).take(limit).collect();

    ListJobsResponse {
        jobs: page,
        total,
        limit,
        offset,
    }
}
