//! Common types used throughout the matchmaking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for players
pub type PlayerId = String;

/// Name of a game variant ("coin-flip", "dice-duel", ...)
pub type GameType = String;

/// Unique identifier for queue entries
pub type QueueId = Uuid;

/// Unique identifier for pending matches
pub type MatchId = Uuid;

/// Unique identifier for challenges
pub type ChallengeId = Uuid;

/// Unique identifier for games
pub type GameId = Uuid;

/// Partition key for the waiting pool: players only ever pair within
/// the same game type at the exact same wager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub game_type: GameType,
    pub wager_amount: u64,
}

impl BucketKey {
    pub fn new(game_type: impl Into<GameType>, wager_amount: u64) -> Self {
        Self {
            game_type: game_type.into(),
            wager_amount,
        }
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.game_type, self.wager_amount)
    }
}

/// A player waiting in the pool for an opponent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitingRequest {
    pub queue_id: QueueId,
    pub player_id: PlayerId,
    pub game_type: GameType,
    pub wager_amount: u64,
    /// Normalized 0-100 compatibility rating, used only for pairing balance
    pub skill_score: u8,
    pub queued_at: DateTime<Utc>,
    pub max_wait: Duration,
}

impl WaitingRequest {
    pub fn bucket_key(&self) -> BucketKey {
        BucketKey::new(self.game_type.clone(), self.wager_amount)
    }

    /// Elapsed time in the queue
    pub fn wait_time(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.queued_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.wait_time(now) > self.max_wait
    }
}

/// Lifecycle states of a pending match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    AwaitingAcceptance,
    Confirmed,
    Cancelled,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::AwaitingAcceptance => write!(f, "awaiting_acceptance"),
            MatchStatus::Confirmed => write!(f, "confirmed"),
            MatchStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why a pending match was cancelled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CancelReason {
    Declined { by: PlayerId },
    AcceptTimeout,
    Disconnected { player: PlayerId },
    GameCreationFailed,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Declined { by } => write!(f, "declined by {}", by),
            CancelReason::AcceptTimeout => write!(f, "acceptance deadline passed"),
            CancelReason::Disconnected { player } => write!(f, "{} disconnected", player),
            CancelReason::GameCreationFailed => write!(f, "game creation failed"),
        }
    }
}

/// A found pairing awaiting mutual confirmation before becoming a real game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingMatch {
    pub match_id: MatchId,
    /// Exactly two distinct players
    pub players: [PlayerId; 2],
    pub game_type: GameType,
    pub wager_amount: u64,
    pub created_at: DateTime<Utc>,
    pub accept_deadline: DateTime<Utc>,
    pub status: MatchStatus,
    /// Players who have confirmed so far
    pub accepted: Vec<PlayerId>,
}

impl PendingMatch {
    pub fn involves(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p == player_id)
    }

    pub fn opponent_of(&self, player_id: &str) -> Option<&PlayerId> {
        self.players.iter().find(|p| p.as_str() != player_id)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, MatchStatus::Confirmed | MatchStatus::Cancelled)
    }
}

/// Lifecycle states of a direct challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Sent,
    Accepted,
    Declined,
    Expired,
    Revoked,
}

/// A direct, targeted invite between two named players that bypasses
/// the pool queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub challenge_id: ChallengeId,
    pub challenger_id: PlayerId,
    pub target_id: PlayerId,
    pub game_type: GameType,
    pub wager_amount: u64,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ChallengeStatus,
}

impl Challenge {
    pub fn is_active(&self) -> bool {
        self.status == ChallengeStatus::Sent
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Why a player left the waiting pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    UserQuit,
    Disconnect,
}

/// Player-facing notifications, fanned out through a NotificationChannel.
///
/// The channel only ever holds (player, event) pairs; ownership of the
/// underlying domain entities stays with the stores that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Notification {
    QueueJoined {
        queue_id: QueueId,
        position: usize,
        estimated_wait_secs: u64,
    },
    QueueLeft {
        reason: LeaveReason,
    },
    MatchFound {
        match_id: MatchId,
        opponent: PlayerId,
        accept_deadline: DateTime<Utc>,
    },
    GameReady {
        game_id: GameId,
    },
    MatchCancelled {
        reason: CancelReason,
    },
    Timeout {
        waited_secs: u64,
    },
    ChallengeReceived {
        challenge: Challenge,
    },
    ChallengeDeclined {
        challenge_id: ChallengeId,
        reason: Option<String>,
    },
    ChallengeExpired {
        challenge_id: ChallengeId,
    },
}

impl Notification {
    /// Stable event name, used for routing keys and test assertions
    pub fn name(&self) -> &'static str {
        match self {
            Notification::QueueJoined { .. } => "queue-joined",
            Notification::QueueLeft { .. } => "queue-left",
            Notification::MatchFound { .. } => "match-found",
            Notification::GameReady { .. } => "game-ready",
            Notification::MatchCancelled { .. } => "match-cancelled",
            Notification::Timeout { .. } => "timeout",
            Notification::ChallengeReceived { .. } => "challenge-received",
            Notification::ChallengeDeclined { .. } => "challenge-declined",
            Notification::ChallengeExpired { .. } => "challenge-expired",
        }
    }
}

/// Result of a successful JoinQueue call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinOutcome {
    pub queue_id: QueueId,
    pub position: usize,
    pub estimated_wait: Duration,
}

/// Result of a GetQueueStatus call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub in_queue: bool,
    pub position: Option<usize>,
    pub wait_time: Option<Duration>,
}

/// Per-bucket aggregate for GetQueueStats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketStats {
    pub bucket: BucketKey,
    pub waiting: usize,
}

/// Aggregate counts returned by GetQueueStats
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStatsReport {
    pub total_waiting: usize,
    pub pending_matches: usize,
    pub active_challenges: usize,
    pub buckets: Vec<BucketStats>,
}

/// Options passed to the external game-creation collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameOptions {
    pub game_type: GameType,
    pub wager_amount: u64,
    pub is_private: bool,
}

/// Handle to a created game, owned by the external GameService
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub game_id: GameId,
    pub game_type: GameType,
    pub wager_amount: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::current_timestamp;

    #[test]
    fn test_bucket_key_display() {
        let key = BucketKey::new("coin-flip", 250);
        assert_eq!(key.to_string(), "coin-flip:250");
    }

    #[test]
    fn test_waiting_request_expiry() {
        let now = current_timestamp();
        let request = WaitingRequest {
            queue_id: Uuid::new_v4(),
            player_id: "p1".to_string(),
            game_type: "dice-duel".to_string(),
            wager_amount: 100,
            skill_score: 50,
            queued_at: now - chrono::Duration::seconds(10),
            max_wait: Duration::from_secs(5),
        };

        assert!(request.is_expired(now));
        assert_eq!(request.wait_time(now), Duration::from_secs(10));
    }

    #[test]
    fn test_pending_match_participants() {
        let now = current_timestamp();
        let pending = PendingMatch {
            match_id: Uuid::new_v4(),
            players: ["a".to_string(), "b".to_string()],
            game_type: "coin-flip".to_string(),
            wager_amount: 100,
            created_at: now,
            accept_deadline: now + chrono::Duration::seconds(30),
            status: MatchStatus::AwaitingAcceptance,
            accepted: vec![],
        };

        assert!(pending.involves("a"));
        assert!(!pending.involves("c"));
        assert_eq!(pending.opponent_of("a").unwrap(), "b");
        assert!(!pending.is_terminal());
    }

    #[test]
    fn test_notification_names() {
        let event = Notification::Timeout { waited_secs: 30 };
        assert_eq!(event.name(), "timeout");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "timeout");
    }
}
