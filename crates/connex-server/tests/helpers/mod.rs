//! Test helpers for connex server integration tests
//!
//! - A scripted in-process [`DataSource`]
//! - Service builders over [`MemoryStore`]
//! - Tracing setup

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use connex_common::record::Batch;
use connex_server::{
    cache::CacheIndex,
    extractor::{Extractor, ExtractorConfig},
    source::{parse_connections, DataSource, FetchError},
    storage::MemoryStore,
    ExtractionService,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BUCKET: &str = "connex-test";
pub const URL_TTL: i64 = 3600;

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,connex_server=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Upstream payload with one record per timestamp.
pub fn board(times: &[&str]) -> Value {
    json!({
        "connections": times
            .iter()
            .map(|t| json!({ "time": t, "to": "Zürich HB" }))
            .collect::<Vec<_>>()
    })
}

/// Replays canned responses; repeats the last one once the script runs out.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Value, String>>>,
    last: Mutex<Option<Result<Value, String>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Value, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Always answers with `payload`.
    pub fn constant(payload: Value) -> Self {
        Self::new(vec![Ok(payload)])
    }

    /// Sleep before answering, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    async fn get(&self, _endpoint: &str) -> Result<Batch, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        let response = match next {
            Some(response) => {
                *self.last.lock().unwrap() = Some(response.clone());
                response
            },
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Err("script is empty".to_string())),
        };

        match response {
            Ok(payload) => parse_connections(payload),
            Err(message) => Err(FetchError::Status {
                status: 503,
                body: message,
            }),
        }
    }
}

pub struct TestService {
    pub service: ExtractionService,
    pub source: Arc<ScriptedSource>,
    pub store: MemoryStore,
}

pub fn service_with(source: ScriptedSource, max_retries: u32) -> TestService {
    let source = Arc::new(source);
    let store = MemoryStore::new();
    let cache = CacheIndex::new(Arc::new(store.clone()), BUCKET);
    let extractor = Extractor::new(ExtractorConfig {
        max_retries,
        ..ExtractorConfig::default()
    });

    TestService {
        service: ExtractionService::new(source.clone(), extractor, cache, URL_TTL),
        source,
        store,
    }
}
