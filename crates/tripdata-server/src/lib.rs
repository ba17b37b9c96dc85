// HTTP surface for the trip records service.
//
// Wires the query engine (partition cache + local store + remote source)
// behind two routes:
// - GET /trips  - timestamp-paginated trip queries
// - GET /health - liveness check
//
// Structured logging with tracing, graceful shutdown on Ctrl+C/SIGTERM,
// and a best-effort async audit sink that never blocks the query path.

use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tripdata_config::RuntimeConfig;
use tripdata_core::{PartitionCache, PartitionStore, SourceClient, TripEngine};

mod audit;
mod handlers;
mod init;

use audit::AuditHandle;
use handlers::{get_trips, health_check};

/// Application state shared across all requests
#[derive(Clone)]
pub(crate) struct AppState {
    pub engine: Arc<TripEngine>,
    pub audit: AuditHandle,
}

/// Error type that implements IntoResponse. Caller errors carry their
/// validation detail on the wire; internal failures go to the log and the
/// wire gets only a generic line.
#[derive(Debug)]
pub(crate) struct AppError {
    status: StatusCode,
    public_message: String,
    public_detail: Option<String>,
    cause: anyhow::Error,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request error: {:?}", self.cause);
        let mut body = json!({ "error": self.public_message });
        if let Some(detail) = self.public_detail {
            body["detail"] = json!(detail);
        }
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            status: StatusCode::BAD_REQUEST,
            public_message: "Invalid request parameters".to_string(),
            cause: anyhow::anyhow!("{detail}"),
            public_detail: Some(detail),
        }
    }

    pub fn internal(cause: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            public_message: "An internal error occurred while processing the request"
                .to_string(),
            public_detail: None,
            cause,
        }
    }
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/trips", get(get_trips))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Entry point: build the engine from resolved config and serve until
/// shutdown.
pub async fn run_with_config(config: RuntimeConfig) -> Result<()> {
    init::init_tracing(&config);

    let store = PartitionStore::new(&config.cache.dir).with_context(|| {
        format!("Failed to prepare cache directory {}", config.cache.dir)
    })?;
    let source = SourceClient::new(&config.source.base_url, config.source.fetch_timeout())
        .context("Failed to build remote source client")?;
    let cache = PartitionCache::new(config.cache.max_partitions);
    let engine = TripEngine::new(Arc::new(cache), Arc::new(store), Arc::new(source));

    let audit = audit::spawn(&config.audit).context("Failed to start audit sink")?;

    let state = AppState {
        engine: Arc::new(engine),
        audit,
    };
    let app = build_router(state);

    let addr = &config.server.listen_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Trip data endpoint listening on http://{}", addr);
    info!("Routes:");
    info!("  GET http://{}/trips  - trip queries", addr);
    info!("  GET http://{}/health - health check", addr);
    info!("Press Ctrl+C or send SIGTERM to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");

    Ok(())
}
