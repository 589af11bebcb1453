//! reqwest-backed [`DataSource`]

use async_trait::async_trait;
use connex_common::record::Batch;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{parse_connections, DataSource, FetchError};

/// Default per-request timeout in seconds.
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent sent upstream.
pub const DEFAULT_USER_AGENT: &str = concat!("connex/", env!("CARGO_PKG_VERSION"));

/// Longest upstream error body kept in a [`FetchError::Status`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Headers added to every request (e.g. an API key).
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Query parameters appended to every request.
    #[serde(default)]
    pub query: Vec<(String, String)>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_SOURCE_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Vec::new(),
            query: Vec::new(),
        }
    }
}

/// Fetches batches with a plain HTTP GET.
#[derive(Clone)]
pub struct HttpDataSource {
    client: Client,
    query: Vec<(String, String)>,
}

impl HttpDataSource {
    pub fn new(config: &SourceConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            query: config.query.clone(),
        })
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    #[instrument(skip(self))]
    async fn get(&self, endpoint: &str) -> Result<Batch, FetchError> {
        let mut request = self.client.get(endpoint);
        if !self.query.is_empty() {
            request = request.query(&self.query);
        }

        let response = request.send().await.map_err(|source| FetchError::Transport {
            url: endpoint.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(format!("invalid JSON: {}", e)))?;

        let batch = parse_connections(payload)?;
        debug!(records = batch.len(), "Fetched batch");

        Ok(batch)
    }
}
