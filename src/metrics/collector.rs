//! Metrics collection using Prometheus

use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
    queue_metrics: QueueMetrics,
    match_metrics: MatchMetrics,
    challenge_metrics: ChallengeMetrics,
    tick_metrics: TickMetrics,
}

/// Waiting-pool metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Total join-queue requests by game type
    pub players_queued_total: IntCounterVec,
    /// Players currently waiting across all buckets
    pub players_waiting: IntGauge,
    /// Requests removed by the expiry sweep
    pub queue_timeouts_total: IntCounter,
    /// Observed wait time of matched players
    pub queue_wait_time_seconds: Histogram,
}

/// Pending-match metrics
#[derive(Clone)]
pub struct MatchMetrics {
    pub matches_created_total: IntCounter,
    pub matches_confirmed_total: IntCounter,
    /// Cancellations by reason (declined, accept_timeout, disconnected)
    pub matches_cancelled_total: IntCounterVec,
    pub games_created_total: IntCounter,
}

/// Direct-challenge metrics
#[derive(Clone)]
pub struct ChallengeMetrics {
    pub challenges_created_total: IntCounter,
    pub challenges_accepted_total: IntCounter,
    pub challenges_declined_total: IntCounter,
    pub challenges_expired_total: IntCounter,
}

/// Orchestrator tick metrics
#[derive(Clone)]
pub struct TickMetrics {
    pub tick_duration_seconds: Histogram,
    pub tick_bucket_errors_total: IntCounter,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let queue_metrics = QueueMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let challenge_metrics = ChallengeMetrics::new(&registry)?;
        let tick_metrics = TickMetrics::new(&registry)?;

        Ok(Self {
            registry,
            queue_metrics,
            match_metrics,
            challenge_metrics,
            tick_metrics,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn challenges(&self) -> &ChallengeMetrics {
        &self.challenge_metrics
    }

    pub fn ticks(&self) -> &TickMetrics {
        &self.tick_metrics
    }

    pub fn record_queue_join(&self, game_type: &str) {
        self.queue_metrics
            .players_queued_total
            .with_label_values(&[game_type])
            .inc();
    }

    pub fn record_match_found(&self, waits: &[Duration]) {
        self.match_metrics.matches_created_total.inc();
        for wait in waits {
            self.queue_metrics
                .queue_wait_time_seconds
                .observe(wait.as_secs_f64());
        }
    }

    pub fn record_match_cancelled(&self, reason: &str) {
        self.match_metrics
            .matches_cancelled_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn record_game_created(&self) {
        self.match_metrics.matches_confirmed_total.inc();
        self.match_metrics.games_created_total.inc();
    }

    pub fn record_tick(&self, duration: Duration) {
        self.tick_metrics
            .tick_duration_seconds
            .observe(duration.as_secs_f64());
    }

    pub fn set_players_waiting(&self, count: usize) {
        self.queue_metrics.players_waiting.set(count as i64);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("default metrics registry must accept collectors")
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let players_queued_total = IntCounterVec::new(
            Opts::new(
                "arena_players_queued_total",
                "Total join-queue requests by game type",
            ),
            &["game_type"],
        )?;
        let players_waiting = IntGauge::new(
            "arena_players_waiting",
            "Players currently waiting across all buckets",
        )?;
        let queue_timeouts_total = IntCounter::new(
            "arena_queue_timeouts_total",
            "Waiting requests removed by the expiry sweep",
        )?;
        let queue_wait_time_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "arena_queue_wait_time_seconds",
                "Observed wait time of matched players",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        )?;

        registry.register(Box::new(players_queued_total.clone()))?;
        registry.register(Box::new(players_waiting.clone()))?;
        registry.register(Box::new(queue_timeouts_total.clone()))?;
        registry.register(Box::new(queue_wait_time_seconds.clone()))?;

        Ok(Self {
            players_queued_total,
            players_waiting,
            queue_timeouts_total,
            queue_wait_time_seconds,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_created_total = IntCounter::new(
            "arena_matches_created_total",
            "Pending matches produced by the orchestrator",
        )?;
        let matches_confirmed_total = IntCounter::new(
            "arena_matches_confirmed_total",
            "Pending matches confirmed by both players",
        )?;
        let matches_cancelled_total = IntCounterVec::new(
            Opts::new(
                "arena_matches_cancelled_total",
                "Pending matches cancelled, by reason",
            ),
            &["reason"],
        )?;
        let games_created_total = IntCounter::new(
            "arena_games_created_total",
            "Games handed off to the game service",
        )?;

        registry.register(Box::new(matches_created_total.clone()))?;
        registry.register(Box::new(matches_confirmed_total.clone()))?;
        registry.register(Box::new(matches_cancelled_total.clone()))?;
        registry.register(Box::new(games_created_total.clone()))?;

        Ok(Self {
            matches_created_total,
            matches_confirmed_total,
            matches_cancelled_total,
            games_created_total,
        })
    }
}

impl ChallengeMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let challenges_created_total = IntCounter::new(
            "arena_challenges_created_total",
            "Direct challenges created",
        )?;
        let challenges_accepted_total = IntCounter::new(
            "arena_challenges_accepted_total",
            "Direct challenges accepted",
        )?;
        let challenges_declined_total = IntCounter::new(
            "arena_challenges_declined_total",
            "Direct challenges declined",
        )?;
        let challenges_expired_total = IntCounter::new(
            "arena_challenges_expired_total",
            "Direct challenges removed by the expiry sweep",
        )?;

        registry.register(Box::new(challenges_created_total.clone()))?;
        registry.register(Box::new(challenges_accepted_total.clone()))?;
        registry.register(Box::new(challenges_declined_total.clone()))?;
        registry.register(Box::new(challenges_expired_total.clone()))?;

        Ok(Self {
            challenges_created_total,
            challenges_accepted_total,
            challenges_declined_total,
            challenges_expired_total,
        })
    }
}

impl TickMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let tick_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "arena_tick_duration_seconds",
                "Duration of orchestrator ticks",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        let tick_bucket_errors_total = IntCounter::new(
            "arena_tick_bucket_errors_total",
            "Bucket failures caught during orchestrator ticks",
        )?;

        registry.register(Box::new(tick_duration_seconds.clone()))?;
        registry.register(Box::new(tick_bucket_errors_total.clone()))?;

        Ok(Self {
            tick_duration_seconds,
            tick_bucket_errors_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_registers_metric_families() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_queue_join("coin-flip");
        collector.record_match_found(&[Duration::from_secs(4), Duration::from_secs(6)]);
        collector.record_match_cancelled("declined");
        collector.record_game_created();
        collector.record_tick(Duration::from_millis(3));
        collector.set_players_waiting(7);

        let families = collector.registry().gather();
        assert!(!families.is_empty());

        let names: Vec<String> = families
            .iter()
            .map(|mf| mf.get_name().to_string())
            .collect();
        assert!(names.iter().any(|n| n.contains("players_queued")));
        assert!(names.iter().any(|n| n.contains("matches_cancelled")));
        assert!(names.iter().any(|n| n.contains("tick_duration")));
    }
}
