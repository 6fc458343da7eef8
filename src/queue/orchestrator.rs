//! Matchmaking tick loop
//!
//! Runs on a fixed interval: expiry sweeps first (queue, pending matches,
//! challenges), then per-bucket pairing against an ordered snapshot. The
//! compatibility check plus removal of both requests is one synchronous
//! in-memory operation with no intervening I/O; notifications happen only
//! after removal succeeded.

use crate::acceptance::AcceptanceTracker;
use crate::challenge::ChallengeRegistry;
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::notify::NotificationChannel;
use crate::queue::compat::plan_pairings;
use crate::queue::store::QueueStore;
use crate::types::{BucketKey, Notification};
use crate::utils::current_timestamp;
use crate::wait_time::WaitTimeEstimator;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Tuning knobs for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Interval between ticks
    pub tick_interval: Duration,
    /// How long both players have to accept a found match
    pub accept_deadline: Duration,
    /// How many candidates past the anchor to scan per pairing attempt
    pub scan_window: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(2),
            accept_deadline: Duration::from_secs(30),
            scan_window: 5,
        }
    }
}

/// What one tick accomplished, for logging and tests
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    pub queue_timeouts: usize,
    pub matches_created: usize,
    pub matches_expired: usize,
    pub challenges_expired: usize,
}

/// Periodic matcher over the waiting pool
pub struct MatchOrchestrator {
    store: Arc<dyn QueueStore>,
    acceptance: Arc<AcceptanceTracker>,
    challenges: Arc<ChallengeRegistry>,
    notifier: Arc<dyn NotificationChannel>,
    metrics: Arc<MetricsCollector>,
    estimator: Arc<WaitTimeEstimator>,
    config: OrchestratorConfig,
}

impl MatchOrchestrator {
    pub fn new(
        store: Arc<dyn QueueStore>,
        acceptance: Arc<AcceptanceTracker>,
        challenges: Arc<ChallengeRegistry>,
        notifier: Arc<dyn NotificationChannel>,
        metrics: Arc<MetricsCollector>,
        estimator: Arc<WaitTimeEstimator>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            acceptance,
            challenges,
            notifier,
            metrics,
            estimator,
            config,
        }
    }

    /// Run one full tick: sweeps, then pairing per bucket
    pub async fn run_tick(&self) -> TickSummary {
        let started = std::time::Instant::now();
        let now = current_timestamp();
        let mut summary = TickSummary::default();

        summary.queue_timeouts = self.sweep_queue(now).await;
        summary.matches_expired = self.sweep_acceptance(now).await;
        summary.challenges_expired = self.sweep_challenges(now).await;

        for bucket in self.store.bucket_keys() {
            match self.process_bucket(&bucket, now).await {
                Ok(created) => summary.matches_created += created,
                Err(e) => {
                    // One bad bucket must not starve the others
                    error!("Failed to process bucket {}: {}", bucket, e);
                    self.metrics.ticks().tick_bucket_errors_total.inc();
                }
            }
        }

        self.metrics.set_players_waiting(self.store.len());
        self.metrics.record_tick(started.elapsed());

        if summary.matches_created > 0 || summary.queue_timeouts > 0 {
            info!(
                "Tick complete - matches: {}, queue timeouts: {}, match deadlines: {}, challenge expiries: {}",
                summary.matches_created,
                summary.queue_timeouts,
                summary.matches_expired,
                summary.challenges_expired
            );
        }

        summary
    }

    /// Remove requests that outlived their max wait and notify the players
    async fn sweep_queue(&self, now: DateTime<Utc>) -> usize {
        let expired = self.store.sweep_expired(now);
        for request in &expired {
            self.metrics.queue().queue_timeouts_total.inc();
            let waited = request.wait_time(now);
            debug!(
                "Queue timeout for {} after {:?} in {}",
                request.player_id,
                waited,
                request.bucket_key()
            );
            if let Err(e) = self
                .notifier
                .send(
                    &request.player_id,
                    Notification::Timeout {
                        waited_secs: waited.as_secs(),
                    },
                )
                .await
            {
                warn!("Failed to deliver timeout to {}: {}", request.player_id, e);
            }
        }
        expired.len()
    }

    /// Cancel pending matches whose accept deadline passed
    async fn sweep_acceptance(&self, now: DateTime<Utc>) -> usize {
        let expired = self.acceptance.sweep_expired(now);
        for (pending, reason) in &expired {
            self.metrics.record_match_cancelled("accept_timeout");
            self.notifier
                .send_to_both(
                    &pending.players,
                    Notification::MatchCancelled {
                        reason: reason.clone(),
                    },
                )
                .await;
        }
        expired.len()
    }

    /// Expire stale challenges and tell the challengers
    async fn sweep_challenges(&self, now: DateTime<Utc>) -> usize {
        let expired = self.challenges.sweep_expired(now);
        for challenge in &expired {
            self.metrics.challenges().challenges_expired_total.inc();
            if let Err(e) = self
                .notifier
                .send(
                    &challenge.challenger_id,
                    Notification::ChallengeExpired {
                        challenge_id: challenge.challenge_id,
                    },
                )
                .await
            {
                warn!(
                    "Failed to deliver challenge expiry to {}: {}",
                    challenge.challenger_id, e
                );
            }
        }
        expired.len()
    }

    /// Pair compatible players within one bucket
    async fn process_bucket(&self, bucket: &BucketKey, now: DateTime<Utc>) -> Result<usize> {
        let snapshot = self.store.snapshot(bucket);
        if snapshot.len() < 2 {
            return Ok(0);
        }

        let planned = plan_pairings(snapshot, now, self.config.scan_window);
        let mut created = 0;

        for pair in planned {
            let (a, b) = match self
                .store
                .remove_pair(&pair.first.player_id, &pair.second.player_id)
            {
                Ok(removed) => removed,
                Err(e) => {
                    // One side left between snapshot and removal
                    debug!("Skipping planned pair in {}: {}", bucket, e);
                    continue;
                }
            };

            let deadline = now
                + chrono::Duration::from_std(self.config.accept_deadline)
                    .unwrap_or_else(|_| chrono::Duration::seconds(30));

            let pending = match self.acceptance.create(
                [a.player_id.clone(), b.player_id.clone()],
                bucket.game_type.clone(),
                bucket.wager_amount,
                deadline,
            ) {
                Ok(pending) => pending,
                Err(e) => {
                    // Give the requests back rather than dropping them
                    warn!("Could not track pairing in {}: {}", bucket, e);
                    for request in [a, b] {
                        let player = request.player_id.clone();
                        let waited = request.wait_time(now).as_secs();
                        if let Err(add_err) = self.store.add(request) {
                            // The slot is gone for good; the player must hear it
                            warn!(
                                "Could not return {} to {}: {}",
                                player, bucket, add_err
                            );
                            if let Err(send_err) = self
                                .notifier
                                .send(&player, Notification::Timeout { waited_secs: waited })
                                .await
                            {
                                warn!("Failed to deliver timeout to {}: {}", player, send_err);
                            }
                        }
                    }
                    continue;
                }
            };

            self.metrics
                .record_match_found(&[a.wait_time(now), b.wait_time(now)]);
            self.estimator.record(bucket, a.wait_time(now));
            self.estimator.record(bucket, b.wait_time(now));
            created += 1;

            info!(
                "Match {} found in {}: {} vs {}",
                pending.match_id, bucket, a.player_id, b.player_id
            );

            for request in [&a, &b] {
                let opponent = pending
                    .opponent_of(&request.player_id)
                    .cloned()
                    .unwrap_or_default();
                if let Err(e) = self
                    .notifier
                    .send(
                        &request.player_id,
                        Notification::MatchFound {
                            match_id: pending.match_id,
                            opponent,
                            accept_deadline: pending.accept_deadline,
                        },
                    )
                    .await
                {
                    warn!(
                        "Failed to deliver match-found to {}: {}",
                        request.player_id, e
                    );
                }
            }
        }

        Ok(created)
    }

    /// Spawn the periodic tick task
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(&self);

        tokio::spawn(async move {
            let mut tick = interval(orchestrator.config.tick_interval);

            loop {
                tick.tick().await;
                orchestrator.run_tick().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MockNotificationChannel;
    use crate::queue::store::InMemoryQueueStore;
    use crate::types::WaitingRequest;
    use crate::utils::generate_queue_id;

    struct Fixture {
        orchestrator: MatchOrchestrator,
        store: Arc<InMemoryQueueStore>,
        acceptance: Arc<AcceptanceTracker>,
        notifier: Arc<MockNotificationChannel>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryQueueStore::new());
        let acceptance = Arc::new(AcceptanceTracker::new());
        let challenges = Arc::new(ChallengeRegistry::new());
        let notifier = Arc::new(MockNotificationChannel::new());
        let metrics = Arc::new(MetricsCollector::new().unwrap());

        let orchestrator = MatchOrchestrator::new(
            store.clone(),
            acceptance.clone(),
            challenges,
            notifier.clone(),
            metrics,
            Arc::new(WaitTimeEstimator::default()),
            OrchestratorConfig::default(),
        );

        Fixture {
            orchestrator,
            store,
            acceptance,
            notifier,
        }
    }

    fn request(player: &str, skill: u8) -> WaitingRequest {
        WaitingRequest {
            queue_id: generate_queue_id(),
            player_id: player.to_string(),
            game_type: "coin-flip".to_string(),
            wager_amount: 100,
            skill_score: skill,
            queued_at: current_timestamp(),
            max_wait: Duration::from_secs(300),
        }
    }

    #[tokio::test]
    async fn test_tick_pairs_compatible_requests() {
        let f = fixture();
        f.store.add(request("a", 50)).unwrap();
        f.store.add(request("b", 55)).unwrap();

        let summary = f.orchestrator.run_tick().await;

        assert_eq!(summary.matches_created, 1);
        assert!(f.store.is_empty());
        assert_eq!(f.acceptance.len(), 1);
        assert_eq!(f.notifier.count_events_of_type("match-found"), 2);

        // Opponent ids cross-reference each other
        let a_events = f.notifier.events_for("a");
        match &a_events[0] {
            Notification::MatchFound { opponent, .. } => assert_eq!(opponent, "b"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tick_leaves_incompatible_requests_queued() {
        let f = fixture();
        f.store.add(request("a", 10)).unwrap();
        f.store.add(request("b", 90)).unwrap();

        let summary = f.orchestrator.run_tick().await;

        assert_eq!(summary.matches_created, 0);
        assert_eq!(f.store.len(), 2);
        assert_eq!(f.notifier.count_events_of_type("match-found"), 0);
    }

    #[tokio::test]
    async fn test_tick_sweeps_expired_requests() {
        let f = fixture();
        let mut stale = request("slow", 50);
        stale.queued_at = current_timestamp() - chrono::Duration::seconds(10);
        stale.max_wait = Duration::from_secs(1);
        f.store.add(stale).unwrap();

        let summary = f.orchestrator.run_tick().await;

        assert_eq!(summary.queue_timeouts, 1);
        assert!(f.store.is_empty());
        assert_eq!(f.notifier.count_events_of_type("timeout"), 1);
    }

    #[tokio::test]
    async fn test_tick_cancels_overdue_matches() {
        let f = fixture();
        f.acceptance
            .create(
                ["a".to_string(), "b".to_string()],
                "coin-flip".to_string(),
                100,
                current_timestamp() - chrono::Duration::seconds(1),
            )
            .unwrap();

        let summary = f.orchestrator.run_tick().await;

        assert_eq!(summary.matches_expired, 1);
        assert!(f.acceptance.is_empty());
        assert_eq!(f.notifier.count_events_of_type("match-cancelled"), 2);
    }

    #[tokio::test]
    async fn test_failed_pairing_returns_requests_to_queue() {
        let f = fixture();
        // One side already holds a pending match, so tracking the new
        // pairing is refused and both requests must go back to the pool
        f.acceptance
            .create(
                ["a".to_string(), "x".to_string()],
                "coin-flip".to_string(),
                100,
                current_timestamp() + chrono::Duration::seconds(30),
            )
            .unwrap();
        f.store.add(request("a", 50)).unwrap();
        f.store.add(request("b", 52)).unwrap();

        let summary = f.orchestrator.run_tick().await;

        assert_eq!(summary.matches_created, 0);
        assert_eq!(f.store.len(), 2);
        assert!(f.store.find("a").is_some());
        assert!(f.store.find("b").is_some());
        assert_eq!(f.notifier.count_events_of_type("match-found"), 0);
    }

    #[tokio::test]
    async fn test_buckets_pair_independently() {
        let f = fixture();
        f.store.add(request("a", 50)).unwrap();
        let mut other_bucket = request("b", 50);
        other_bucket.wager_amount = 500;
        f.store.add(other_bucket).unwrap();

        let summary = f.orchestrator.run_tick().await;

        assert_eq!(summary.matches_created, 0);
        assert_eq!(f.store.len(), 2);
    }
}
