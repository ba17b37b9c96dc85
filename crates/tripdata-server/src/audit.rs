// Best-effort request audit sink.
//
// Handlers push records into a bounded channel with try_send; a single
// worker task posts them to an Elasticsearch-style endpoint. A full queue
// drops the record, a down sink logs at debug. Nothing here may block or
// fail the query path.

use anyhow::{Context, Result};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tripdata_config::AuditConfig;

const SINK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AuditRecord {
    pub endpoint: String,
    pub method: String,
    pub status_code: u16,
    pub process_time_ms: f64,
    /// RFC 3339 wall-clock time the request finished.
    pub timestamp: String,
}

/// Cheap-to-clone handle held in application state. `tx` is `None` when the
/// sink is disabled in config.
#[derive(Clone)]
pub(crate) struct AuditHandle {
    tx: Option<mpsc::Sender<AuditRecord>>,
}

impl AuditHandle {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn record(&self, endpoint: &str, method: &str, status: StatusCode, elapsed: Duration) {
        let Some(tx) = &self.tx else {
            return;
        };
        let record = AuditRecord {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            status_code: status.as_u16(),
            process_time_ms: elapsed.as_secs_f64() * 1_000.0,
            timestamp: Utc::now().to_rfc3339(),
        };
        if let Err(err) = tx.try_send(record) {
            debug!("audit record dropped: {err}");
        }
    }
}

/// Start the sink worker and return a handle for request handlers.
pub(crate) fn spawn(config: &AuditConfig) -> Result<AuditHandle> {
    if !config.enabled {
        return Ok(AuditHandle::disabled());
    }

    let client = reqwest::Client::builder()
        .timeout(SINK_TIMEOUT)
        .build()
        .context("Failed to build audit sink HTTP client")?;
    let url = format!(
        "{}/{}/_doc",
        config.host.trim_end_matches('/'),
        config.index
    );
    let (tx, mut rx) = mpsc::channel::<AuditRecord>(config.queue_capacity);

    info!(url = %url, "audit sink enabled");
    tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            match client.post(&url).json(&record).send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    debug!(status = %response.status(), "audit sink rejected record");
                }
                Err(err) => {
                    debug!("audit sink unreachable: {err}");
                }
            }
        }
    });

    Ok(AuditHandle { tx: Some(tx) })
}
