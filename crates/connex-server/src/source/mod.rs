//! Upstream data sources
//!
//! A [`DataSource`] performs one network fetch of one window of records for
//! a logical endpoint. Retrying is the extractor's job, never the source's.

use async_trait::async_trait;
use connex_common::record::{Batch, Record};
use serde_json::Value;
use thiserror::Error;

pub mod http;

pub use http::{HttpDataSource, SourceConfig};

/// Name of the field holding the record array in upstream payloads.
pub const CONNECTIONS_FIELD: &str = "connections";

/// A single failed fetch. Always retryable from the extractor's point of view.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed upstream payload: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch one batch for `endpoint`, earliest record first.
    async fn get(&self, endpoint: &str) -> Result<Batch, FetchError>;
}

/// Pull the `connections` array out of an upstream document.
pub fn parse_connections(payload: Value) -> Result<Batch, FetchError> {
    let Value::Object(mut document) = payload else {
        return Err(FetchError::Malformed("payload is not a JSON object".to_string()));
    };

    match document.remove(CONNECTIONS_FIELD) {
        Some(Value::Array(items)) => Ok(items.into_iter().map(Record::new).collect()),
        Some(_) => Err(FetchError::Malformed(format!(
            "'{}' is not an array",
            CONNECTIONS_FIELD
        ))),
        None => Err(FetchError::Malformed(format!(
            "missing '{}' field",
            CONNECTIONS_FIELD
        ))),
    }
}
