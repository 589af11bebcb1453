//! Connex Server - Main entry point

use anyhow::Result;
use connex_common::logging::{init_logging, LogConfig};
use tracing::info;

use connex_server::{api, build_service, config::Config, jobs::JobStore, storage::StorageConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("connex-server")
        .filter_directives("connex_server=debug,tower_http=debug,aws_config=warn")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let _guard = init_logging(&log_config)?;

    info!("Starting connex server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let storage_config = StorageConfig::from_env()?;
    info!(
        backend = ?storage_config.backend,
        bucket = %storage_config.bucket,
        "Storage configured"
    );

    let service = build_service(&config, &storage_config).await?;
    info!(
        max_retries = config.extractor.max_retries,
        grace_minutes = config.extractor.grace_minutes,
        url_ttl_secs = config.cache.url_ttl_secs,
        "Extraction service ready"
    );

    let jobs = JobStore::with_retention(config.jobs.to_retention());
    info!(
        retention_secs = config.jobs.retention_secs,
        max_jobs = config.jobs.max_jobs,
        "Job store ready"
    );

    api::serve(config, api::AppState::new(service, jobs)).await
}
