//! Extraction with gap detection, backfill and deduplication
//!
//! One call to [`Extractor::extract`] is one logical extraction. It fetches a
//! batch, checks whether the leading edge of the day is missing, re-fetches
//! while budget remains, and finally deduplicates the merged data.
//!
//! Backfill is a loop over an [`ExtractionState`] owned by the run, not
//! recursion. Fetch failures and gaps draw from the same retry budget; an
//! exhausted budget is a hard failure and no partial data is returned.

use chrono::{Duration, NaiveDateTime};
use connex_common::record::{
    dedup_records, first_timed_record, oldest_record, Batch, Record, RecordTime,
};
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::source::DataSource;

/// Default number of re-fetches after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default grace window past local midnight, in minutes.
pub const DEFAULT_GRACE_MINUTES: i64 = 15;

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub max_retries: u32,
    /// A batch starting later than midnight + grace is missing leading data.
    pub grace_period: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            grace_period: Duration::minutes(DEFAULT_GRACE_MINUTES),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Max retries exceeded for {endpoint} after {attempts} attempts: {reason}")]
    MaxRetriesExceeded {
        endpoint: String,
        attempts: u32,
        reason: String,
    },
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Merged, deduplicated records.
    pub records: Batch,
    /// Earliest record of `records`; the stored watermark after this run.
    pub watermark: Option<Record>,
    pub attempts: u32,
    pub retries_used: u32,
}

/// Why a batch was judged incomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gap {
    Empty,
    NoParsableTime,
    StartsAfterGrace { first: NaiveDateTime },
}

impl fmt::Display for Gap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gap::Empty => write!(f, "upstream returned an empty batch"),
            Gap::NoParsableTime => write!(f, "no record carries a parsable time"),
            Gap::StartsAfterGrace { first } => {
                write!(f, "batch starts at {} past the grace window", first)
            },
        }
    }
}

/// Per-run state, dropped when the run returns.
#[derive(Debug)]
struct ExtractionState {
    endpoint: String,
    current_data: Batch,
    retries_remaining: u32,
    attempts: u32,
    oldest_retrieved: Option<Record>,
    newest_stored: Option<Record>,
}

impl ExtractionState {
    fn new(endpoint: &str, max_retries: u32, newest_stored: Option<Record>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            current_data: Vec::new(),
            retries_remaining: max_retries,
            attempts: 0,
            oldest_retrieved: None,
            newest_stored,
        }
    }

    /// Put `batch` ahead of what was accumulated; a backfill reads from an
    /// earlier start than the fetch before it.
    fn absorb(&mut self, batch: Batch) {
        let mut merged = batch;
        merged.append(&mut self.current_data);
        self.current_data = merged;
        self.oldest_retrieved = oldest_record(&self.current_data).cloned();
    }

    /// Consume one unit of budget, or fail if none is left.
    fn spend_retry(&mut self, reason: String) -> Result<(), ExtractError> {
        if self.retries_remaining == 0 {
            return Err(ExtractError::MaxRetriesExceeded {
                endpoint: self.endpoint.clone(),
                attempts: self.attempts,
                reason,
            });
        }
        self.retries_remaining -= 1;
        Ok(())
    }

    fn finish(mut self, max_retries: u32) -> Extraction {
        self.current_data = dedup_records(std::mem::take(&mut self.current_data));
        self.oldest_retrieved = oldest_record(&self.current_data).cloned();
        self.newest_stored = self.oldest_retrieved.clone();

        Extraction {
            records: self.current_data,
            watermark: self.newest_stored,
            attempts: self.attempts,
            retries_used: max_retries - self.retries_remaining,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractorConfig,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Run one extraction against `source`.
    ///
    /// `newest_stored` is the watermark of data already persisted; a batch
    /// whose leading edge reaches back to it is not considered gappy.
    #[instrument(skip(self, source, newest_stored), fields(max_retries = self.config.max_retries))]
    pub async fn extract(
        &self,
        source: &dyn DataSource,
        endpoint: &str,
        newest_stored: Option<Record>,
    ) -> Result<Extraction, ExtractError> {
        let stored_time = newest_stored.as_ref().and_then(Record::sort_key);
        let mut state = ExtractionState::new(endpoint, self.config.max_retries, newest_stored);

        loop {
            state.attempts += 1;
            debug!(
                attempt = state.attempts,
                retries_remaining = state.retries_remaining,
                "Fetching batch"
            );

            let reason = match source.get(endpoint).await {
                Ok(batch) => {
                    let gap = self.detect_gap(&batch, stored_time.as_ref());
                    debug!(records = batch.len(), gap = ?gap, "Batch received");
                    state.absorb(batch);
                    match gap {
                        None => break,
                        Some(gap) => gap.to_string(),
                    }
                },
                Err(e) => {
                    warn!(attempt = state.attempts, error = %e, "Fetch failed");
                    format!("fetch failed: {}", e)
                },
            };

            if let Err(e) = state.spend_retry(reason) {
                error!(attempts = state.attempts, error = %e, "Giving up on extraction");
                return Err(e);
            }

            info!(
                attempt = state.attempts,
                retries_remaining = state.retries_remaining,
                "Backfilling missing leading data"
            );
        }

        let extraction = state.finish(self.config.max_retries);

        info!(
            records = extraction.records.len(),
            attempts = extraction.attempts,
            retries_used = extraction.retries_used,
            watermark = ?extraction.watermark.as_ref().and_then(Record::time),
            "Extraction complete"
        );

        Ok(extraction)
    }

    /// Decide whether `batch` is missing data at its leading edge.
    ///
    /// Malformed records are skipped; the first parsable record is the edge.
    pub fn detect_gap(&self, batch: &[Record], newest_stored: Option<&RecordTime>) -> Option<Gap> {
        if batch.is_empty() {
            return Some(Gap::Empty);
        }

        let Some((_, first)) = first_timed_record(batch) else {
            return Some(Gap::NoParsableTime);
        };

        if let Some(stored) = newest_stored {
            if first <= *stored {
                return None;
            }
        }

        if first.is_after_grace(self.config.grace_period) {
            return Some(Gap::StartsAfterGrace { first: first.local() });
        }

        None
    }
}
