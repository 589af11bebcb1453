//! List cache entries
//!
//! One query per partition plus a listing of the partitions themselves.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheEntry, CacheError, CacheIndex};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEntriesQuery {
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEntriesResponse {
    pub date: NaiveDate,
    pub entries: Vec<CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDatesResponse {
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListEntriesError {
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<ListEntriesError> for AppError {
    fn from(err: ListEntriesError) -> Self {
        match err {
            ListEntriesError::InvalidDate(_) => AppError::bad_request("Invalid date", err.to_string()),
            ListEntriesError::Cache(e) => e.into(),
        }
    }
}

impl ListEntriesQuery {
    pub fn validate(&self) -> Result<NaiveDate, ListEntriesError> {
        NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|_| ListEntriesError::InvalidDate(self.date.clone()))
    }
}

pub async fn handle(
    cache: &CacheIndex,
    query: ListEntriesQuery,
) -> Result<ListEntriesResponse, ListEntriesError> {
    let date = query.validate()?;
    let entries = cache.entries_for(date).await?;
    Ok(ListEntriesResponse { date, entries })
}

pub async fn handle_dates(cache: &CacheIndex) -> Result<ListDatesResponse, ListEntriesError> {
    let dates = cache.partition_dates().await?;
    Ok(ListDatesResponse { dates })
}
