//! `GET /health` progress endpoint.

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::models::IngestionRun;
use crate::orchestrator::RunObserver;

#[derive(Debug, Clone, Default)]
struct Progress {
    current_unit: Option<String>,
    units_completed: usize,
    units_failed: usize,
    records_written: usize,
    records_rejected: usize,
    last_update: Option<DateTime<Utc>>,
}

/// Shared run progress, updated by the orchestrator and read by the handler.
#[derive(Clone)]
pub struct ProgressState {
    started_at: DateTime<Utc>,
    inner: Arc<RwLock<Progress>>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressState {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            inner: Arc::new(RwLock::new(Progress::default())),
        }
    }

    pub async fn snapshot(&self) -> serde_json::Value {
        let p = self.inner.read().await;
        json!({
            "started_at": self.started_at.to_rfc3339(),
            "current_unit": p.current_unit,
            "units_completed": p.units_completed,
            "units_failed": p.units_failed,
            "records_written": p.records_written,
            "records_rejected": p.records_rejected,
            "last_update": p.last_update.map(|t| t.to_rfc3339()),
        })
    }
}

#[async_trait]
impl RunObserver for ProgressState {
    async fn unit_started(&self, run: &IngestionRun) {
        let mut p = self.inner.write().await;
        p.current_unit = Some(run.label());
        p.last_update = Some(Utc::now());
    }

    async fn unit_finished(&self, run: &IngestionRun) {
        let mut p = self.inner.write().await;
        p.current_unit = None;
        p.units_completed += 1;
        p.units_failed += usize::from(run.is_failed());
        p.records_written += run.records_written;
        p.records_rejected += run.records_rejected;
        p.last_update = Some(Utc::now());
    }
}

async fn health_handler(State(state): State<ProgressState>) -> (StatusCode, Json<serde_json::Value>) {
    let (failed, completed) = {
        let p = state.inner.read().await;
        (p.units_failed, p.units_completed)
    };

    let status = if failed > 0 { "degraded" } else { "ok" };
    // Nothing has succeeded yet but units keep failing.
    let http_status = if failed > 0 && failed == completed {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let mut body = state.snapshot().await;
    body["service"] = json!("stats-ingestion");
    body["version"] = json!(env!("CARGO_PKG_VERSION"));
    body["status"] = json!(status);
    (http_status, Json(body))
}

pub fn router(state: ProgressState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Binds the health endpoint and serves it in the background.
pub async fn spawn_server(port: u16, state: ProgressState) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Health endpoint listening on {}", addr);
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(state)).await {
            error!("Health server stopped: {}", e);
        }
    }))
}
