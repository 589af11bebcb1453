//! Extract command
//!
//! Creates a job, runs the pipeline for today's partition and records the
//! outcome on the job.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::jobs::{JobStatus, JobStore, JobStoreError};
use crate::pipeline::{ExtractionService, PipelineError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractCommand {
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub status: JobStatus,
    pub url: String,
    pub job_id: Uuid,
    pub artifact_id: String,
    pub cache_hit: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractCommandError {
    #[error("Endpoint is required and cannot be empty")]
    EndpointRequired,
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Jobs(#[from] JobStoreError),
}

impl From<ExtractCommandError> for AppError {
    fn from(err: ExtractCommandError) -> Self {
        match err {
            ExtractCommandError::EndpointRequired => {
                AppError::bad_request("Missing endpoint parameter", err.to_string())
            },
            ExtractCommandError::Pipeline(e) => e.into(),
            ExtractCommandError::Jobs(e) => e.into(),
        }
    }
}

impl ExtractCommand {
    /// The trimmed endpoint, if present.
    pub fn validate(&self) -> Result<&str, ExtractCommandError> {
        match self.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => Ok(endpoint),
            _ => Err(ExtractCommandError::EndpointRequired),
        }
    }
}

#[tracing::instrument(skip(service, jobs))]
pub async fn handle(
    service: &ExtractionService,
    jobs: &JobStore,
    command: ExtractCommand,
) -> Result<ExtractResponse, ExtractCommandError> {
    handle_for_date(service, jobs, command, Utc::now().date_naive()).await
}

/// Same as [`handle`] with an explicit partition date.
pub async fn handle_for_date(
    service: &ExtractionService,
    jobs: &JobStore,
    command: ExtractCommand,
    date: NaiveDate,
) -> Result<ExtractResponse, ExtractCommandError> {
    let endpoint = command.validate()?;

    let job = jobs.create(endpoint).await;
    tracing::info!(job_id = %job.id, endpoint = %endpoint, "Extraction job created");

    match service.run(endpoint, date).await {
        Ok(outcome) => {
            let job = jobs.complete(&job, &outcome.artifact_id).await?;
            Ok(ExtractResponse {
                status: job.status,
                url: outcome.url,
                job_id: job.id,
                artifact_id: outcome.artifact_id,
                cache_hit: outcome.cache_hit,
            })
        },
        Err(e) => {
            if let Err(store_err) = jobs.fail(&job, e.to_string()).await {
                tracing::warn!(job_id = %job.id, error = %store_err, "Could not mark job failed");
            }
            Err(e.into())
        },
    }
}
