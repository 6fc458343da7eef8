//! Matchmaking engine facade
//!
//! The single entry point every transport talks to. The engine validates
//! input, consults the player directory, delegates state changes to the
//! stores, and drives the side effects (notifications, game creation,
//! metrics) that follow from each state change.

use crate::acceptance::{AcceptOutcome, AcceptanceTracker};
use crate::challenge::{ChallengeOptions, ChallengeRegistry};
use crate::error::{MatchmakingError, Result};
use crate::metrics::MetricsCollector;
use crate::notify::NotificationChannel;
use crate::queue::store::QueueStore;
use crate::reconcile::{DisconnectOutcome, DisconnectReconciler};
use crate::services::{GameService, PlayerDirectory};
use crate::types::{
    BucketStats, CancelReason, Challenge, ChallengeId, Game, GameOptions, JoinOutcome,
    LeaveReason, MatchId, Notification, PlayerId, QueueStatsReport, QueueStatus, WaitingRequest,
};
use crate::utils::{current_timestamp, generate_queue_id};
use crate::wait_time::WaitTimeEstimator;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Engine-level tuning knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Max wait applied when a join request does not give one
    pub default_max_wait: Duration,
    /// Upper bound any requested max wait is clamped to
    pub max_wait_cap: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_wait: Duration::from_secs(600),
            max_wait_cap: Duration::from_secs(3600),
        }
    }
}

/// Result of recording one player's match acceptance
#[derive(Debug, Clone)]
pub enum MatchAcceptResult {
    /// Waiting for the opponent to accept
    AwaitingOpponent,
    /// Both accepted; the game exists and both players were told
    GameCreated(Game),
}

/// Facade over the queue, acceptance, and challenge state machines
pub struct MatchmakingEngine {
    store: Arc<dyn QueueStore>,
    acceptance: Arc<AcceptanceTracker>,
    challenges: Arc<ChallengeRegistry>,
    games: Arc<dyn GameService>,
    directory: Arc<dyn PlayerDirectory>,
    notifier: Arc<dyn NotificationChannel>,
    metrics: Arc<MetricsCollector>,
    estimator: Arc<WaitTimeEstimator>,
    reconciler: DisconnectReconciler,
    config: EngineConfig,
}

impl MatchmakingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn QueueStore>,
        acceptance: Arc<AcceptanceTracker>,
        challenges: Arc<ChallengeRegistry>,
        games: Arc<dyn GameService>,
        directory: Arc<dyn PlayerDirectory>,
        notifier: Arc<dyn NotificationChannel>,
        metrics: Arc<MetricsCollector>,
        estimator: Arc<WaitTimeEstimator>,
        config: EngineConfig,
    ) -> Self {
        let reconciler = DisconnectReconciler::new(
            Arc::clone(&store),
            Arc::clone(&acceptance),
            Arc::clone(&notifier),
            Arc::clone(&metrics),
        );

        Self {
            store,
            acceptance,
            challenges,
            games,
            directory,
            notifier,
            metrics,
            estimator,
            reconciler,
            config,
        }
    }

    fn validate_stake(game_type: &str, wager_amount: u64) -> Result<()> {
        if game_type.trim().is_empty() {
            return Err(MatchmakingError::validation("game type must not be empty"));
        }
        if wager_amount == 0 {
            return Err(MatchmakingError::validation(
                "wager amount must be positive",
            ));
        }
        Ok(())
    }

    /// Put a player into the waiting pool.
    ///
    /// The skill score comes from the player directory, never from the
    /// caller. Players already queued or holding a pending match are
    /// rejected with a conflict.
    pub async fn join_queue(
        &self,
        player_id: &str,
        game_type: &str,
        wager_amount: u64,
        max_wait: Option<Duration>,
    ) -> Result<JoinOutcome> {
        Self::validate_stake(game_type, wager_amount)?;
        if player_id.trim().is_empty() {
            return Err(MatchmakingError::validation("player id must not be empty"));
        }

        if self.acceptance.contains_player(player_id) {
            return Err(MatchmakingError::conflict(format!(
                "player {} has a pending match awaiting acceptance",
                player_id
            )));
        }

        let skill_score = self.directory.skill_score(player_id).await?;

        let request = WaitingRequest {
            queue_id: generate_queue_id(),
            player_id: player_id.to_string(),
            game_type: game_type.to_string(),
            wager_amount,
            skill_score,
            queued_at: current_timestamp(),
            max_wait: max_wait
                .unwrap_or(self.config.default_max_wait)
                .min(self.config.max_wait_cap),
        };
        let bucket = request.bucket_key();
        let queue_id = request.queue_id;

        let position = self.store.add(request)?;
        let estimated_wait = self.estimator.estimate(&bucket);

        self.metrics.record_queue_join(game_type);
        self.metrics.set_players_waiting(self.store.len());
        info!(
            "Player {} joined {} at position {}",
            player_id, bucket, position
        );

        if let Err(e) = self
            .notifier
            .send(
                player_id,
                Notification::QueueJoined {
                    queue_id,
                    position,
                    estimated_wait_secs: estimated_wait.as_secs(),
                },
            )
            .await
        {
            tracing::warn!("Failed to deliver queue-joined to {}: {}", player_id, e);
        }

        Ok(JoinOutcome {
            queue_id,
            position,
            estimated_wait,
        })
    }

    /// Remove a player from the pool. Idempotent: returns whether an
    /// entry was actually removed.
    pub async fn leave_queue(&self, player_id: &str) -> Result<bool> {
        let Some(request) = self.store.remove(player_id) else {
            return Ok(false);
        };

        self.metrics.set_players_waiting(self.store.len());
        info!("Player {} left {}", player_id, request.bucket_key());

        if let Err(e) = self
            .notifier
            .send(
                player_id,
                Notification::QueueLeft {
                    reason: LeaveReason::UserQuit,
                },
            )
            .await
        {
            tracing::warn!("Failed to deliver queue-left to {}: {}", player_id, e);
        }
        Ok(true)
    }

    /// Where a player currently stands in the pool
    pub fn queue_status(&self, player_id: &str) -> QueueStatus {
        let now = current_timestamp();
        match self.store.find(player_id) {
            Some(request) => QueueStatus {
                in_queue: true,
                position: self.store.position(player_id),
                wait_time: Some(request.wait_time(now)),
            },
            None => QueueStatus {
                in_queue: false,
                position: None,
                wait_time: None,
            },
        }
    }

    /// Aggregate pool counts, optionally filtered by game type and wager range
    pub fn queue_stats(
        &self,
        game_type: Option<&str>,
        wager_range: Option<RangeInclusive<u64>>,
    ) -> QueueStatsReport {
        let mut buckets: Vec<BucketStats> = self
            .store
            .bucket_keys()
            .into_iter()
            .filter(|key| game_type.map_or(true, |g| key.game_type == g))
            .filter(|key| {
                wager_range
                    .as_ref()
                    .map_or(true, |r| r.contains(&key.wager_amount))
            })
            .map(|key| {
                let waiting = self.store.snapshot(&key).len();
                BucketStats {
                    bucket: key,
                    waiting,
                }
            })
            .collect();
        buckets.sort_by(|a, b| {
            a.bucket
                .game_type
                .cmp(&b.bucket.game_type)
                .then(a.bucket.wager_amount.cmp(&b.bucket.wager_amount))
        });

        QueueStatsReport {
            total_waiting: buckets.iter().map(|b| b.waiting).sum(),
            pending_matches: self.acceptance.len(),
            active_challenges: self.challenges.active_count(),
            buckets,
        }
    }

    /// Create the game for a confirmed pairing: one side creates, the
    /// other joins.
    async fn start_game(
        &self,
        players: &[PlayerId; 2],
        game_type: &str,
        wager_amount: u64,
    ) -> Result<Game> {
        let game = self
            .games
            .create_game(
                &players[0],
                GameOptions {
                    game_type: game_type.to_string(),
                    wager_amount,
                    is_private: true,
                },
            )
            .await?;
        self.games.join_game(&players[1], game.game_id).await?;
        Ok(game)
    }

    /// Record a player's acceptance of a found match.
    ///
    /// When the second acceptance lands the game is created immediately:
    /// one side creates, the other joins, and both receive `game-ready`.
    pub async fn accept_match(
        &self,
        match_id: MatchId,
        player_id: &str,
    ) -> Result<MatchAcceptResult> {
        let now = current_timestamp();
        let known = self.acceptance.get(match_id);

        match self.acceptance.accept(match_id, player_id, now) {
            Ok(AcceptOutcome::AwaitingOpponent(_)) => Ok(MatchAcceptResult::AwaitingOpponent),
            Ok(AcceptOutcome::Confirmed(pending)) => {
                let game = match self
                    .start_game(&pending.players, &pending.game_type, pending.wager_amount)
                    .await
                {
                    Ok(game) => game,
                    Err(e) => {
                        // The tracker already dropped the match; both sides
                        // must hear that it died rather than see it vanish
                        self.metrics.record_match_cancelled("game_creation_failed");
                        tracing::warn!("Game creation for match {} failed: {}", match_id, e);
                        self.notifier
                            .send_to_both(
                                &pending.players,
                                Notification::MatchCancelled {
                                    reason: CancelReason::GameCreationFailed,
                                },
                            )
                            .await;
                        return Err(e);
                    }
                };

                self.metrics.record_game_created();
                info!(
                    "Match {} confirmed, game {} created for {} vs {}",
                    match_id, game.game_id, pending.players[0], pending.players[1]
                );

                self.notifier
                    .send_to_both(
                        &pending.players,
                        Notification::GameReady {
                            game_id: game.game_id,
                        },
                    )
                    .await;
                Ok(MatchAcceptResult::GameCreated(game))
            }
            Err(e) if e.is_expired() => {
                // The tracker already cancelled the match; tell both sides
                if let Some(pending) = known {
                    self.metrics.record_match_cancelled("accept_timeout");
                    self.notifier
                        .send_to_both(
                            &pending.players,
                            Notification::MatchCancelled {
                                reason: CancelReason::AcceptTimeout,
                            },
                        )
                        .await;
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Decline a found match. The counterpart is notified and must rejoin
    /// the queue explicitly; nobody is re-enqueued automatically.
    pub async fn decline_match(&self, match_id: MatchId, player_id: &str) -> Result<()> {
        let pending = self.acceptance.decline(match_id, player_id)?;

        self.metrics.record_match_cancelled("declined");
        info!("Match {} declined by {}", match_id, player_id);

        self.notifier
            .send_to_both(
                &pending.players,
                Notification::MatchCancelled {
                    reason: CancelReason::Declined {
                        by: player_id.to_string(),
                    },
                },
            )
            .await;
        Ok(())
    }

    /// Send a direct challenge. Both players must exist in the directory.
    pub async fn create_challenge(
        &self,
        challenger_id: &str,
        target_id: &str,
        game_type: &str,
        wager_amount: u64,
        opts: ChallengeOptions,
    ) -> Result<Challenge> {
        Self::validate_stake(game_type, wager_amount)?;
        if matches!(opts.expires_in_secs, Some(secs) if secs <= 0) {
            return Err(MatchmakingError::validation(
                "challenge expiry must be positive",
            ));
        }

        // Existence checks before any state is created
        self.directory.skill_score(challenger_id).await?;
        self.directory.skill_score(target_id).await?;

        let challenge = self.challenges.create(
            challenger_id.to_string(),
            target_id.to_string(),
            game_type.to_string(),
            wager_amount,
            opts,
        )?;

        self.metrics.challenges().challenges_created_total.inc();
        info!(
            "Challenge {} sent: {} -> {}",
            challenge.challenge_id, challenger_id, target_id
        );

        if let Err(e) = self
            .notifier
            .send(
                target_id,
                Notification::ChallengeReceived {
                    challenge: challenge.clone(),
                },
            )
            .await
        {
            tracing::warn!(
                "Failed to deliver challenge-received to {}: {}",
                target_id,
                e
            );
        }
        Ok(challenge)
    }

    /// Accept a challenge as its target. The invite was the challenger's
    /// consent, so acceptance creates the game straight away.
    pub async fn accept_challenge(&self, challenge_id: ChallengeId, player_id: &str) -> Result<Game> {
        let now = current_timestamp();
        let known = self.challenges.get(challenge_id);

        let challenge = match self.challenges.accept(challenge_id, player_id, now) {
            Ok(challenge) => challenge,
            Err(e) if e.is_expired() => {
                if let Some(challenge) = known {
                    self.metrics.challenges().challenges_expired_total.inc();
                    let _ = self
                        .notifier
                        .send(
                            &challenge.challenger_id,
                            Notification::ChallengeExpired { challenge_id },
                        )
                        .await;
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let players = [challenge.challenger_id.clone(), challenge.target_id.clone()];
        let game = match self
            .start_game(&players, &challenge.game_type, challenge.wager_amount)
            .await
        {
            Ok(game) => game,
            Err(e) => {
                // The challenge is already retired; both sides must hear
                // that the game never materialized
                self.metrics.record_match_cancelled("game_creation_failed");
                tracing::warn!("Game creation for challenge {} failed: {}", challenge_id, e);
                self.notifier
                    .send_to_both(
                        &players,
                        Notification::MatchCancelled {
                            reason: CancelReason::GameCreationFailed,
                        },
                    )
                    .await;
                return Err(e);
            }
        };

        self.metrics.challenges().challenges_accepted_total.inc();
        self.metrics.record_game_created();
        info!(
            "Challenge {} accepted, game {} created",
            challenge_id, game.game_id
        );

        self.notifier
            .send_to_both(
                &players,
                Notification::GameReady {
                    game_id: game.game_id,
                },
            )
            .await;
        Ok(game)
    }

    /// Decline a challenge as its target; the challenger is told why
    pub async fn decline_challenge(
        &self,
        challenge_id: ChallengeId,
        player_id: &str,
        reason: Option<String>,
    ) -> Result<Challenge> {
        let challenge = self.challenges.decline(challenge_id, player_id)?;

        self.metrics.challenges().challenges_declined_total.inc();
        info!("Challenge {} declined by {}", challenge_id, player_id);

        if let Err(e) = self
            .notifier
            .send(
                &challenge.challenger_id,
                Notification::ChallengeDeclined {
                    challenge_id,
                    reason,
                },
            )
            .await
        {
            tracing::warn!(
                "Failed to deliver challenge-declined to {}: {}",
                challenge.challenger_id,
                e
            );
        }
        Ok(challenge)
    }

    /// Withdraw an unanswered challenge as its sender
    pub fn revoke_challenge(&self, challenge_id: ChallengeId, player_id: &str) -> Result<Challenge> {
        let challenge = self.challenges.revoke(challenge_id, player_id)?;
        info!("Challenge {} revoked by {}", challenge_id, player_id);
        Ok(challenge)
    }

    /// Clean up all matchmaking state for a dropped connection
    pub async fn handle_disconnect(&self, player_id: &str) -> DisconnectOutcome {
        self.reconciler.handle_disconnect(player_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::notify::MockNotificationChannel;
    use crate::queue::store::InMemoryQueueStore;
    use crate::services::{MockGameService, StaticPlayerDirectory};
    use crate::types::GameId;

    /// Game service whose backend is down
    struct FailingGameService;

    #[async_trait::async_trait]
    impl GameService for FailingGameService {
        async fn create_game(&self, _player_id: &str, _opts: GameOptions) -> Result<Game> {
            Err(MatchmakingError::transport("game backend unavailable"))
        }

        async fn join_game(&self, _player_id: &str, _game_id: GameId) -> Result<Game> {
            Err(MatchmakingError::transport("game backend unavailable"))
        }
    }

    fn fixture_with_failing_games() -> Fixture {
        let store = Arc::new(InMemoryQueueStore::new());
        let acceptance = Arc::new(AcceptanceTracker::new());
        let challenges = Arc::new(ChallengeRegistry::new());
        let games = Arc::new(MockGameService::new());
        let directory = Arc::new(StaticPlayerDirectory::open());
        let notifier = Arc::new(MockNotificationChannel::new());
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let estimator = Arc::new(WaitTimeEstimator::default());

        let engine = MatchmakingEngine::new(
            store,
            acceptance.clone(),
            challenges,
            Arc::new(FailingGameService),
            directory,
            notifier.clone(),
            metrics,
            estimator,
            EngineConfig::default(),
        );

        Fixture {
            engine,
            acceptance,
            games,
            notifier,
        }
    }

    struct Fixture {
        engine: MatchmakingEngine,
        acceptance: Arc<AcceptanceTracker>,
        games: Arc<MockGameService>,
        notifier: Arc<MockNotificationChannel>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryQueueStore::new());
        let acceptance = Arc::new(AcceptanceTracker::new());
        let challenges = Arc::new(ChallengeRegistry::new());
        let games = Arc::new(MockGameService::new());
        let directory = Arc::new(StaticPlayerDirectory::open());
        let notifier = Arc::new(MockNotificationChannel::new());
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let estimator = Arc::new(WaitTimeEstimator::default());

        let engine = MatchmakingEngine::new(
            store,
            acceptance.clone(),
            challenges,
            games.clone(),
            directory,
            notifier.clone(),
            metrics,
            estimator,
            EngineConfig::default(),
        );

        Fixture {
            engine,
            acceptance,
            games,
            notifier,
        }
    }

    #[tokio::test]
    async fn test_join_queue_reports_position_and_notifies() {
        let f = fixture();

        let first = f.engine.join_queue("a", "coin-flip", 100, None).await.unwrap();
        let second = f.engine.join_queue("b", "coin-flip", 100, None).await.unwrap();

        assert_eq!(first.position, 1);
        assert_eq!(second.position, 2);
        assert_eq!(f.notifier.count_events_of_type("queue-joined"), 2);
    }

    #[tokio::test]
    async fn test_join_queue_rejects_duplicates_and_bad_input() {
        let f = fixture();
        f.engine.join_queue("a", "coin-flip", 100, None).await.unwrap();

        let dup = f.engine.join_queue("a", "coin-flip", 100, None).await.unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::Conflict);

        let zero = f.engine.join_queue("b", "coin-flip", 0, None).await.unwrap_err();
        assert_eq!(zero.kind(), ErrorKind::Validation);

        let blank = f.engine.join_queue("b", "  ", 100, None).await.unwrap_err();
        assert_eq!(blank.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_join_queue_rejects_player_with_pending_match() {
        let f = fixture();
        f.acceptance
            .create(
                ["a".to_string(), "b".to_string()],
                "coin-flip".to_string(),
                100,
                current_timestamp() + chrono::Duration::seconds(30),
            )
            .unwrap();

        let err = f.engine.join_queue("a", "coin-flip", 100, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_leave_queue_is_idempotent() {
        let f = fixture();
        f.engine.join_queue("a", "coin-flip", 100, None).await.unwrap();

        assert!(f.engine.leave_queue("a").await.unwrap());
        assert!(!f.engine.leave_queue("a").await.unwrap());
        assert_eq!(f.notifier.count_events_of_type("queue-left"), 1);
    }

    #[tokio::test]
    async fn test_queue_status_reflects_membership() {
        let f = fixture();
        f.engine.join_queue("a", "coin-flip", 100, None).await.unwrap();

        let status = f.engine.queue_status("a");
        assert!(status.in_queue);
        assert_eq!(status.position, Some(1));

        let absent = f.engine.queue_status("ghost");
        assert!(!absent.in_queue);
        assert!(absent.position.is_none());
    }

    #[tokio::test]
    async fn test_queue_stats_filters() {
        let f = fixture();
        f.engine.join_queue("a", "coin-flip", 100, None).await.unwrap();
        f.engine.join_queue("b", "coin-flip", 500, None).await.unwrap();
        f.engine.join_queue("c", "dice-duel", 100, None).await.unwrap();

        let all = f.engine.queue_stats(None, None);
        assert_eq!(all.total_waiting, 3);
        assert_eq!(all.buckets.len(), 3);

        let coin = f.engine.queue_stats(Some("coin-flip"), None);
        assert_eq!(coin.total_waiting, 2);

        let cheap = f.engine.queue_stats(None, Some(0..=200));
        assert_eq!(cheap.total_waiting, 2);
    }

    #[tokio::test]
    async fn test_both_accepts_create_game_for_both_players() {
        let f = fixture();
        let pending = f
            .acceptance
            .create(
                ["a".to_string(), "b".to_string()],
                "coin-flip".to_string(),
                100,
                current_timestamp() + chrono::Duration::seconds(30),
            )
            .unwrap();

        match f.engine.accept_match(pending.match_id, "a").await.unwrap() {
            MatchAcceptResult::AwaitingOpponent => {}
            other => panic!("unexpected result: {:?}", other),
        }

        match f.engine.accept_match(pending.match_id, "b").await.unwrap() {
            MatchAcceptResult::GameCreated(game) => {
                assert_eq!(game.game_type, "coin-flip");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        assert_eq!(f.games.created_count(), 1);
        assert_eq!(f.notifier.count_events_of_type("game-ready"), 2);
    }

    #[tokio::test]
    async fn test_decline_match_notifies_both_without_requeue() {
        let f = fixture();
        let pending = f
            .acceptance
            .create(
                ["a".to_string(), "b".to_string()],
                "coin-flip".to_string(),
                100,
                current_timestamp() + chrono::Duration::seconds(30),
            )
            .unwrap();

        f.engine.decline_match(pending.match_id, "b").await.unwrap();

        assert_eq!(f.notifier.count_events_of_type("match-cancelled"), 2);
        // Neither side is silently returned to the pool
        assert!(!f.engine.queue_status("a").in_queue);
        assert!(!f.engine.queue_status("b").in_queue);
    }

    #[tokio::test]
    async fn test_challenge_accept_creates_game() {
        let f = fixture();
        let challenge = f
            .engine
            .create_challenge("a", "b", "coin-flip", 250, ChallengeOptions::default())
            .await
            .unwrap();
        assert_eq!(f.notifier.events_for("b").len(), 1);

        let game = f
            .engine
            .accept_challenge(challenge.challenge_id, "b")
            .await
            .unwrap();

        assert_eq!(game.wager_amount, 250);
        assert_eq!(f.games.created_count(), 1);
        assert_eq!(f.notifier.count_events_of_type("game-ready"), 2);
    }

    #[tokio::test]
    async fn test_challenge_requires_known_players() {
        let store = Arc::new(InMemoryQueueStore::new());
        let directory = Arc::new(StaticPlayerDirectory::new());
        directory.register("a", 50);
        let engine = MatchmakingEngine::new(
            store,
            Arc::new(AcceptanceTracker::new()),
            Arc::new(ChallengeRegistry::new()),
            Arc::new(MockGameService::new()),
            directory,
            Arc::new(MockNotificationChannel::new()),
            Arc::new(MetricsCollector::new().unwrap()),
            Arc::new(WaitTimeEstimator::default()),
            EngineConfig::default(),
        );

        let err = engine
            .create_challenge("a", "ghost", "coin-flip", 100, ChallengeOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_decline_challenge_notifies_challenger() {
        let f = fixture();
        let challenge = f
            .engine
            .create_challenge("a", "b", "coin-flip", 100, ChallengeOptions::default())
            .await
            .unwrap();

        f.engine
            .decline_challenge(challenge.challenge_id, "b", Some("busy".to_string()))
            .await
            .unwrap();

        assert_eq!(f.notifier.count_events_of_type("challenge-declined"), 1);
        assert_eq!(f.notifier.events_for("a").len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_clears_queue_entry() {
        let f = fixture();
        f.engine.join_queue("a", "coin-flip", 100, None).await.unwrap();

        let outcome = f.engine.handle_disconnect("a").await;

        assert!(outcome.removed_from_queue);
        assert!(!f.engine.queue_status("a").in_queue);
    }

    #[tokio::test]
    async fn test_game_creation_failure_notifies_both_players() {
        let f = fixture_with_failing_games();
        let pending = f
            .acceptance
            .create(
                ["a".to_string(), "b".to_string()],
                "coin-flip".to_string(),
                100,
                current_timestamp() + chrono::Duration::seconds(30),
            )
            .unwrap();

        f.engine.accept_match(pending.match_id, "a").await.unwrap();
        let err = f.engine.accept_match(pending.match_id, "b").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        // The match is gone, but never silently: both sides hear it died
        assert!(f.acceptance.is_empty());
        assert_eq!(f.notifier.count_events_of_type("game-ready"), 0);
        assert_eq!(f.notifier.count_events_of_type("match-cancelled"), 2);
        assert_eq!(f.notifier.events_for("a").len(), 1);
        assert_eq!(f.notifier.events_for("b").len(), 1);
    }

    #[tokio::test]
    async fn test_challenge_game_creation_failure_notifies_both_players() {
        let f = fixture_with_failing_games();
        let challenge = f
            .engine
            .create_challenge("a", "b", "coin-flip", 100, ChallengeOptions::default())
            .await
            .unwrap();

        let err = f
            .engine
            .accept_challenge(challenge.challenge_id, "b")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(f.notifier.count_events_of_type("game-ready"), 0);
        assert_eq!(f.notifier.count_events_of_type("match-cancelled"), 2);
        // challenge-received on create, match-cancelled on the failed accept
        assert_eq!(f.notifier.events_for("b").len(), 2);
    }

    #[tokio::test]
    async fn test_challenge_rejects_non_positive_expiry() {
        let f = fixture();

        for secs in [0, -5] {
            let err = f
                .engine
                .create_challenge(
                    "a",
                    "b",
                    "coin-flip",
                    100,
                    ChallengeOptions {
                        message: None,
                        expires_in_secs: Some(secs),
                    },
                )
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }
}
