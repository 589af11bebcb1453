//! Upstream records and the time utilities used to reconcile them
//!
//! A [`Record`] is an opaque JSON value. The only field the pipeline reads is
//! `time`, an ISO-8601-like timestamp used for ordering and gap detection.
//! Everything else is compared structurally during deduplication.
//!
//! Batches are pinned to ascending order: the first element is the earliest
//! record of the window.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{ConnexError, Result};

/// Name of the timestamp field carried by every record.
pub const TIME_FIELD: &str = "time";

/// Offset-bearing layouts, tried after RFC 3339.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"];

/// Naive layouts, interpreted as the record's own wall clock.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// An ordered sequence of records returned by one upstream call.
pub type Batch = Vec<Record>;

/// One unit of upstream data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Value);

impl Record {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Raw `time` field, if present and a string.
    pub fn time(&self) -> Option<&str> {
        self.0.get(TIME_FIELD).and_then(Value::as_str)
    }

    /// Parse the `time` field.
    ///
    /// Fails with [`ConnexError::MalformedRecord`] when the field is missing
    /// or does not match any accepted layout.
    pub fn parsed_time(&self) -> Result<RecordTime> {
        match self.time() {
            Some(raw) => RecordTime::parse(raw),
            None => Err(ConnexError::MalformedRecord(format!(
                "record has no '{}' string field",
                TIME_FIELD
            ))),
        }
    }

    /// Ordering key; `None` sorts after every parsable time.
    pub fn sort_key(&self) -> Option<RecordTime> {
        match self.parsed_time() {
            Ok(time) => Some(time),
            Err(e) => {
                tracing::debug!(error = %e, "Treating record as infinitely recent");
                None
            },
        }
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// A parsed record timestamp.
///
/// `local` is the wall clock the record was stamped with (its own offset, or
/// the naive value itself). `instant` is what records are ordered by: UTC
/// for offset-bearing stamps, the wall clock for naive ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordTime {
    local: NaiveDateTime,
    instant: NaiveDateTime,
}

impl RecordTime {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Self::from_fixed(dt));
        }

        for format in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(raw, format) {
                return Ok(Self::from_fixed(dt));
            }
        }

        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Ok(Self {
                    local: naive,
                    instant: naive,
                });
            }
        }

        Err(ConnexError::MalformedRecord(format!(
            "unparsable timestamp '{}'",
            raw
        )))
    }

    fn from_fixed(dt: DateTime<FixedOffset>) -> Self {
        Self {
            local: dt.naive_local(),
            instant: dt.naive_utc(),
        }
    }

    pub fn local(&self) -> NaiveDateTime {
        self.local
    }

    pub fn instant(&self) -> NaiveDateTime {
        self.instant
    }

    /// Midnight of the record's local day.
    pub fn local_midnight(&self) -> NaiveDateTime {
        self.local.date().and_time(NaiveTime::MIN)
    }

    /// True when the record was stamped later than `grace` past local midnight.
    pub fn is_after_grace(&self, grace: Duration) -> bool {
        self.local > self.local_midnight() + grace
    }
}

impl Ord for RecordTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instant
            .cmp(&other.instant)
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl PartialOrd for RecordTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two sort keys, placing missing times last.
pub fn compare_sort_keys(a: Option<&RecordTime>, b: Option<&RecordTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// The record with the earliest timestamp.
///
/// Ties keep the first record encountered. Malformed records never win
/// against a parsable one; if every record is malformed the first is returned.
pub fn oldest_record(records: &[Record]) -> Option<&Record> {
    records
        .iter()
        .map(|record| (record.sort_key(), record))
        .min_by(|(a, _), (b, _)| compare_sort_keys(a.as_ref(), b.as_ref()))
        .map(|(_, record)| record)
}

/// The first record whose timestamp parses, with that timestamp.
pub fn first_timed_record(records: &[Record]) -> Option<(&Record, RecordTime)> {
    records
        .iter()
        .find_map(|record| record.parsed_time().ok().map(|time| (record, time)))
}

/// Remove structural duplicates, keeping first occurrences in order.
///
/// Records are bucketed by their raw `time` so only candidates sharing a
/// timestamp are compared value-by-value.
pub fn dedup_records(records: Vec<Record>) -> Vec<Record> {
    let mut seen: HashMap<Option<String>, Vec<usize>> = HashMap::new();
    let mut unique: Vec<Record> = Vec::with_capacity(records.len());

    for record in records {
        let bucket = seen.entry(record.time().map(str::to_string)).or_default();
        if bucket.iter().any(|&idx| unique[idx] == record) {
            continue;
        }
        bucket.push(unique.len());
        unique.push(record);
    }

    unique
}
