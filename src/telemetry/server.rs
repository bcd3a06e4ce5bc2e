//! HTTP exposition endpoint.
//!
//! Serves `GET /metrics` (text exposition) and `GET /health` on a
//! configurable port. One-shot runs never start this server.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::aggregator::Aggregator;
use super::exporter;

/// Shared state for the telemetry server.
#[derive(Clone)]
pub struct TelemetryState {
    pub aggregator: Arc<Aggregator>,
    pub start_time: Instant,
    pub version: String,
}

impl TelemetryState {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self {
            aggregator,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Build the telemetry router.
pub fn build_routes(state: TelemetryState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the telemetry endpoint until the shutdown channel fires.
pub async fn serve(
    port: u16,
    aggregator: Arc<Aggregator>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let state = TelemetryState::new(aggregator);
    let app = build_routes(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("telemetry endpoint listening on http://0.0.0.0:{port}/metrics");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    info!("telemetry endpoint shut down");
    Ok(())
}

async fn metrics_handler(State(state): State<TelemetryState>) -> impl IntoResponse {
    let body = exporter::render(&state.aggregator.snapshot(), state.aggregator.role());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime: u64,
}

async fn health_handler(State(state): State<TelemetryState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
        uptime: state.start_time.elapsed().as_secs(),
    })
}
