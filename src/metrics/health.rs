//! Health check endpoints and Prometheus metrics server
//!
//! HTTP endpoints for liveness and readiness probes, Prometheus scraping,
//! and a human-readable stats page, served with Axum.

use crate::metrics::collector::MetricsCollector;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    /// Port to bind the health server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the health server
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub app_state: Option<Arc<AppState>>,
}

/// Health server that provides HTTP endpoints for monitoring
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                app_state: None,
            },
            shutdown_tx,
        }
    }

    /// Set the application state for health checks
    pub fn with_app_state(mut self, app_state: Arc<AppState>) -> Self {
        self.state.app_state = Some(app_state);
        self
    }

    /// Start serving until a shutdown signal arrives
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr).await?;

        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server shutdown signal received");
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/alive", get(alive_handler))
            .route("/metrics", get(metrics_handler))
            .route("/stats", get(stats_handler))
            .with_state(self.state.clone())
    }

    /// Stop the health server
    pub async fn stop(&self) -> Result<()> {
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to health server: {}", e);
        }
        Ok(())
    }
}

/// Root endpoint: service information
async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "arena-matchmaker",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/health",
            "/ready",
            "/alive",
            "/metrics",
            "/stats"
        ]
    }))
}

async fn health_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Health check requested");

    let status = match &state.app_state {
        Some(app_state) => HealthCheck::liveness_check(app_state.clone())
            .await
            .unwrap_or(HealthStatus::Unhealthy),
        None => HealthStatus::Unhealthy,
    };

    let code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(json!({
            "status": status,
            "service": "arena-matchmaker",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

async fn ready_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match &state.app_state {
        Some(app_state) => match HealthCheck::readiness_check(app_state.clone()).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
            Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
            Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
            Err(e) => {
                error!("Readiness check failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
            }
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

async fn alive_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Liveness check requested");

    match &state.app_state {
        Some(app_state) => match HealthCheck::liveness_check(app_state.clone()).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Alive"),
            _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

/// Prometheus scrape endpoint
async fn metrics_handler(State(state): State<HealthServerState>) -> Response<String> {
    debug!("Metrics endpoint requested");

    let registry = state.metrics_collector.registry();
    let metric_families = registry.gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_output) => Response::builder()
            .status(StatusCode::OK)
            .header("content-type", encoder.format_type())
            .body(metrics_output)
            .unwrap_or_default(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body("Failed to encode metrics".to_string())
                .unwrap_or_default()
        }
    }
}

/// Detailed service statistics for human consumption
async fn stats_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Stats endpoint requested");

    match &state.app_state {
        Some(app_state) => match HealthCheck::check(app_state.clone()).await {
            Ok(health) => {
                let stats = json!({
                    "service": {
                        "name": health.service,
                        "version": health.version,
                        "status": health.status,
                    },
                    "queue": {
                        "players_waiting": health.stats.players_waiting,
                        "active_buckets": health.stats.active_buckets,
                    },
                    "matches": {
                        "pending": health.stats.pending_matches,
                    },
                    "challenges": {
                        "active": health.stats.active_challenges,
                    },
                    "components": health.checks,
                    "timestamp": chrono::Utc::now()
                });

                (StatusCode::OK, Json(stats))
            }
            Err(e) => {
                error!("Failed to get stats: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({
                        "error": "Failed to get service stats",
                        "timestamp": chrono::Utc::now()
                    })),
                )
            }
        },
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": "Service not initialized",
                "timestamp": chrono::Utc::now()
            })),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt; // for oneshot

    fn test_server() -> HealthServer {
        let collector = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        HealthServer::new(HealthServerConfig::default(), collector)
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let app = test_server().create_router();

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_serves_prometheus_text() {
        let collector = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        collector.record_queue_join("coin-flip");

        let server = HealthServer::new(HealthServerConfig::default(), collector);
        let app = server.create_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));
    }

    #[tokio::test]
    async fn test_probes_without_app_state_are_unavailable() {
        let app = test_server().create_router();

        for uri in ["/health", "/ready", "/alive", "/stats"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = test_server().create_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
