//! Metrics and monitoring for the matchmaking service

pub mod collector;
pub mod health;

pub use collector::{
    ChallengeMetrics, MatchMetrics, MetricsCollector, QueueMetrics, TickMetrics,
};
pub use health::{HealthServer, HealthServerConfig};
