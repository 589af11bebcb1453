//! Extraction job tracking
//!
//! Jobs are kept in process. Every mutation goes through
//! [`JobStore::update`], which checks the caller's view of the job version
//! so concurrent writers cannot silently overwrite each other.
//!
//! Finished jobs are evicted on [`JobStore::create`] once they are older
//! than [`JobRetention::max_age`], or oldest first while the store holds
//! more than [`JobRetention::max_jobs`]. In-progress jobs are never evicted.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Default age after which finished jobs are evicted (one day).
pub const DEFAULT_JOB_RETENTION_SECS: i64 = 86_400;

/// Default cap on tracked jobs.
pub const DEFAULT_MAX_JOBS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub endpoint: String,
    pub status: JobStatus,
    pub artifact_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every update.
    pub version: u64,
}

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job {id} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict { id: Uuid, expected: u64, actual: u64 },

    #[error("Job {id} is already {status}")]
    AlreadyFinished { id: Uuid, status: JobStatus },
}

impl Job {
    pub fn is_finished(&self) -> bool {
        self.status != JobStatus::InProgress
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobRetention {
    pub max_age: Duration,
    pub max_jobs: usize,
}

impl Default for JobRetention {
    fn default() -> Self {
        Self {
            max_age: Duration::seconds(DEFAULT_JOB_RETENTION_SECS),
            max_jobs: DEFAULT_MAX_JOBS,
        }
    }
}

#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
    retention: JobRetention,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: JobRetention) -> Self {
        Self {
            jobs: Arc::default(),
            retention,
        }
    }

    pub async fn create(&self, endpoint: &str) -> Job {
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            endpoint: endpoint.to_string(),
            status: JobStatus::InProgress,
            artifact_id: None,
            error: None,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        let mut jobs = self.jobs.write().await;
        evict(&mut jobs, &self.retention, now);
        jobs.insert(job.id, job.clone());
        drop(jobs);

        tracing::debug!(job_id = %job.id, endpoint = %endpoint, "Job created");
        job
    }

    /// Evict finished jobs that fall outside the retention policy as of
    /// `now`. Returns how many were removed.
    pub async fn prune(&self, now: DateTime<Utc>) -> usize {
        evict(&mut *self.jobs.write().await, &self.retention, now)
    }

    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// All jobs, newest first, optionally narrowed to one status.
    pub async fn list(&self, status: Option<JobStatus>) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| status.map_or(true, |s| job.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    /// Apply `f` if the stored version still equals `expected_version`.
    pub async fn update<F>(&self, id: Uuid, expected_version: u64, f: F) -> Result<Job, JobStoreError>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;

        if job.version != expected_version {
            return Err(JobStoreError::VersionConflict {
                id,
                expected: expected_version,
                actual: job.version,
            });
        }

        f(job);
        job.version += 1;
        job.updated_at = Utc::now();

        Ok(job.clone())
    }

    pub async fn complete(&self, job: &Job, artifact_id: &str) -> Result<Job, JobStoreError> {
        self.finish(job, JobStatus::Completed, Some(artifact_id.to_string()), None)
            .await
    }

    pub async fn fail(&self, job: &Job, error: impl Into<String>) -> Result<Job, JobStoreError> {
        self.finish(job, JobStatus::Failed, None, Some(error.into()))
            .await
    }

    async fn finish(
        &self,
        job: &Job,
        status: JobStatus,
        artifact_id: Option<String>,
        error: Option<String>,
    ) -> Result<Job, JobStoreError> {
        if job.status != JobStatus::InProgress {
            return Err(JobStoreError::AlreadyFinished {
                id: job.id,
                status: job.status,
            });
        }

        let updated = self
            .update(job.id, job.version, |stored| {
                stored.status = status;
                stored.artifact_id = artifact_id;
                stored.error = error;
            })
            .await?;

        tracing::info!(job_id = %updated.id, status = %updated.status, "Job finished");

        Ok(updated)
    }
}

/// Drop finished jobs past `max_age`, then the oldest finished jobs until
/// at most `max_jobs - 1` remain, leaving room for one insert.
fn evict(jobs: &mut HashMap<Uuid, Job>, retention: &JobRetention, now: DateTime<Utc>) -> usize {
    let before = jobs.len();
    let cutoff = now - retention.max_age;
    jobs.retain(|_, job| !(job.is_finished() && job.updated_at < cutoff));

    if jobs.len() >= retention.max_jobs {
        let mut finished: Vec<(DateTime<Utc>, Uuid)> = jobs
            .values()
            .filter(|job| job.is_finished())
            .map(|job| (job.updated_at, job.id))
            .collect();
        finished.sort();

        let excess = jobs.len() + 1 - retention.max_jobs;
        for (_, id) in finished.into_iter().take(excess) {
            jobs.remove(&id);
        }
    }

    let removed = before - jobs.len();
    if removed > 0 {
        tracing::debug!(removed, remaining = jobs.len(), "Evicted finished jobs");
    }
    removed
}
