//! Get job query

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::jobs::{Job, JobStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetJobQuery {
    pub job_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GetJobError {
    #[error("Invalid job id: {0}")]
    InvalidId(String),
    #[error("Job not found")]
    NotFound,
}

impl From<GetJobError> for AppError {
    fn from(err: GetJobError) -> Self {
        match err {
            GetJobError::InvalidId(_) => AppError::bad_request("Invalid job id", err.to_string()),
            GetJobError::NotFound => AppError::NotFound(err.to_string()),
        }
    }
}

impl GetJobQuery {
    pub fn validate(&self) -> Result<Uuid, GetJobError> {
        Uuid::parse_str(self.job_id.trim()).map_err(|_| GetJobError::InvalidId(self.job_id.clone()))
    }
}

pub async fn handle(jobs: &JobStore, query: GetJobQuery) -> Result<Job, GetJobError> {
    let id = query.validate()?;
    jobs.get(id).await.ok_or(GetJobError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_existing_job() {
        let jobs = JobStore::new();
        let job = jobs.create("e").await;

        let found = handle(&jobs, GetJobQuery { job_id: job.id.to_string() })
            .await
            .unwrap();
        assert_eq!(found.id, job.id);
    }

    #[tokio::test]
    async fn test_unknown_and_invalid_ids() {
        let jobs = JobStore::new();

        let unknown = GetJobQuery {
            job_id: Uuid::new_v4().to_string(),
        };
        assert!(matches!(handle(&jobs, unknown).await, Err(GetJobError::NotFound)));

        let invalid = GetJobQuery {
            job_id: "not-a-uuid".to_string(),
        };
        assert!(matches!(handle(&jobs, invalid).await, Err(GetJobError::InvalidId(_))));
    }
}
