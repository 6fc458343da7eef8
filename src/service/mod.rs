//! Service wiring: application state and health probes

pub mod app;
pub mod health;

pub use app::{AppState, ServiceError};
pub use health::{ComponentCheck, HealthCheck, HealthStatus, ServiceStats};
