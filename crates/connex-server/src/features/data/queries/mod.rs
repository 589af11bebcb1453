//! Data queries

pub mod download;
pub mod get_job;
pub mod list_jobs;

pub use download::{DownloadError, DownloadQuery, DownloadResponse};
pub use get_job::{GetJobError, GetJobQuery};
pub use list_jobs::{ListJobsQuery, ListJobsResponse};
