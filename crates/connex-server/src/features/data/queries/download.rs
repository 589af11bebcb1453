//! Download query
//!
//! Re-issues a signed URL for the artifact of a completed job.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::CacheError;
use crate::error::AppError;
use crate::jobs::{JobStatus, JobStore};
use crate::pipeline::ExtractionService;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadQuery {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub job_id: Uuid,
    pub artifact_id: String,
    pub url: String,
    pub expires_in: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Invalid job id: {0}")]
    InvalidId(String),
    #[error("Job not found")]
    NotFound,
    #[error("Job is {0}, not completed")]
    NotCompleted(JobStatus),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<DownloadError> for AppError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::InvalidId(_) => AppError::bad_request("Invalid job id", err.to_string()),
            DownloadError::NotFound => AppError::NotFound(err.to_string()),
            DownloadError::NotCompleted(_) => AppError::Conflict(err.to_string()),
            DownloadError::Cache(e) => e.into(),
        }
    }
}

impl DownloadQuery {
    pub fn validate(&self) -> Result<Uuid, DownloadError> {
        Uuid::parse_str(self.job_id.trim()).map_err(|_| DownloadError::InvalidId(self.job_id.clone()))
    }
}

#[tracing::instrument(skip(service, jobs))]
pub async fn handle(
    service: &ExtractionService,
    jobs: &JobStore,
    query: DownloadQuery,
) -> Result<DownloadResponse, DownloadError> {
    let id = query.validate()?;
    let job = jobs.get(id).await.ok_or(DownloadError::NotFound)?;

    let artifact_id = match (job.status, job.artifact_id) {
        (JobStatus::Completed, Some(artifact_id)) => artifact_id,
        (status, _) => return Err(DownloadError::NotCompleted(status)),
    };

    let expires_in = service.url_ttl_secs();
    let url = service.cache().signed_url_for(&artifact_id, expires_in).await?;

    Ok(DownloadResponse {
        job_id: job.id,
        artifact_id,
        url,
        expires_in,
    })
}
