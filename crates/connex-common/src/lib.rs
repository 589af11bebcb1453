//! Connex Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the Connex workspace.
//!
//! # Overview
//!
//! - **Records**: the opaque, time-stamped unit of upstream data and the
//!   helpers that order and deduplicate it
//! - **Error Handling**: common error and result types
//! - **Logging**: tracing subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use connex_common::record::{dedup_records, oldest_record, Record};
//! use serde_json::json;
//!
//! let batch = vec![
//!     Record::new(json!({ "time": "2024-12-01T00:02:00" })),
//!     Record::new(json!({ "time": "2024-12-01T00:02:00" })),
//! ];
//! let batch = dedup_records(batch);
//! assert_eq!(batch.len(), 1);
//! assert!(oldest_record(&batch).is_some());
//! ```

pub mod error;
pub mod logging;
pub mod record;

// Re-export commonly used types
pub use error::{ConnexError, Result};
pub use record::{Batch, Record, RecordTime};
