//! HTTP front door
//!
//! Builds the router and runs it until Ctrl+C or SIGTERM.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use crate::config::{Config, ServerConfig};
use crate::features;
use crate::jobs::JobStore;
use crate::middleware;
use crate::pipeline::ExtractionService;

/// Upper bound on how long shutdown waits for in-flight requests.
const MAX_SHUTDOWN_GRACE_SECS: u64 = 5;

#[derive(Clone)]
pub struct AppState {
    pub service: ExtractionService,
    pub jobs: JobStore,
}

impl AppState {
    pub fn new(service: ExtractionService, jobs: JobStore) -> Self {
        Self { service, jobs }
    }
}

pub async fn serve(config: Config, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state, &config);

    let listener = bind(&config.server).await?;
    info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

/// Bind the configured host, which may be a hostname or an IP literal.
pub async fn bind(server: &ServerConfig) -> std::io::Result<TcpListener> {
    TcpListener::bind((server.host.as_str(), server.port)).await
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, config: &Config) -> Router {
    let feature_state = features::FeatureState {
        service: state.service,
        jobs: state.jobs,
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", features::router(feature_state))
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "connex",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(MAX_SHUTDOWN_GRACE_SECS))).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(host: &str) -> ServerConfig {
        ServerConfig {
            host: host.to_string(),
            port: 0,
            shutdown_timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn test_bind_accepts_hostnames() {
        let listener = bind(&server("localhost")).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());

        let listener = bind(&server("127.0.0.1")).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_rejects_unresolvable_host() {
        assert!(bind(&server("no such host")).await.is_err());
    }
}
