//! Health check probes for the matchmaking service

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Players currently waiting across all buckets
    pub players_waiting: usize,
    /// Non-empty buckets in the waiting pool
    pub active_buckets: usize,
    /// Matches awaiting acceptance
    pub pending_matches: usize,
    /// Outstanding direct challenges
    pub active_challenges: usize,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let service_check = Self::check_service_running(&app_state).await;
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(service_check);

        let engine_check = Self::check_engine(&app_state);
        if engine_check.status == HealthStatus::Unhealthy {
            overall_status = HealthStatus::Unhealthy;
        } else if engine_check.status == HealthStatus::Degraded
            && overall_status == HealthStatus::Healthy
        {
            overall_status = HealthStatus::Degraded;
        }
        checks.push(engine_check);

        let report = app_state.engine().queue_stats(None, None);
        let stats = ServiceStats {
            players_waiting: report.total_waiting,
            active_buckets: report.buckets.len(),
            pending_matches: report.pending_matches,
            active_challenges: report.active_challenges,
        };

        Ok(HealthCheck {
            status: overall_status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Liveness: the service process is up and has not shut down
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness: the service can handle matchmaking requests
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }
        Ok(Self::check_engine(&app_state).status)
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// The engine is healthy as long as its stores answer stats queries
    fn check_engine(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();
        let _report = app_state.engine().queue_stats(None, None);

        ComponentCheck {
            name: "matchmaking_engine".to_string(),
            status: HealthStatus::Healthy,
            message: None,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
