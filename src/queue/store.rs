//! Waiting-pool storage keyed by (game type, wager amount) buckets
//!
//! The store is the single owner of WaitingRequest state. All mutation goes
//! through the narrow operations below; the orchestrator matches against an
//! ordered snapshot and applies removals through `remove_pair` so the
//! check-and-remove step stays atomic within one process.

use crate::error::{MatchmakingError, Result};
use crate::types::{BucketKey, PlayerId, WaitingRequest};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Storage interface for the waiting pool.
///
/// The in-memory implementation below serves tests and single-process
/// deployments; a distributed implementation sharding buckets to owning
/// processes can be swapped in behind the same trait.
pub trait QueueStore: Send + Sync {
    /// Add a waiting request. Fails with a conflict if the player is
    /// already queued in any bucket.
    fn add(&self, request: WaitingRequest) -> Result<usize>;

    /// Remove a player's request wherever it is. Idempotent.
    fn remove(&self, player_id: &str) -> Option<WaitingRequest>;

    /// Atomically remove both sides of a planned pairing. If either side
    /// has already left, neither is removed and a conflict is returned.
    fn remove_pair(&self, a: &str, b: &str) -> Result<(WaitingRequest, WaitingRequest)>;

    /// Ordered copy of one bucket, oldest entry first
    fn snapshot(&self, bucket: &BucketKey) -> Vec<WaitingRequest>;

    /// Keys of all non-empty buckets
    fn bucket_keys(&self) -> Vec<BucketKey>;

    /// Look up a player's request
    fn find(&self, player_id: &str) -> Option<WaitingRequest>;

    /// 1-based position of a player inside their bucket
    fn position(&self, player_id: &str) -> Option<usize>;

    /// Remove and return every entry that outlived its max wait
    fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<WaitingRequest>;

    /// Total number of waiting players across all buckets
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct StoreInner {
    buckets: HashMap<BucketKey, VecDeque<WaitingRequest>>,
    /// Player -> bucket index enforcing the one-request-per-player invariant
    by_player: HashMap<PlayerId, BucketKey>,
}

/// In-memory queue store for tests and single-process deployments
#[derive(Default)]
pub struct InMemoryQueueStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>> {
        self.inner
            .lock()
            .map_err(|_| MatchmakingError::internal("queue store lock poisoned"))
    }
}

impl StoreInner {
    fn take(&mut self, player_id: &str) -> Option<WaitingRequest> {
        let bucket_key = self.by_player.remove(player_id)?;
        let bucket = self.buckets.get_mut(&bucket_key)?;

        let idx = bucket.iter().position(|r| r.player_id == player_id)?;
        let request = bucket.remove(idx);

        if bucket.is_empty() {
            self.buckets.remove(&bucket_key);
        }
        request
    }
}

impl QueueStore for InMemoryQueueStore {
    fn add(&self, request: WaitingRequest) -> Result<usize> {
        let mut inner = self.lock()?;

        if inner.by_player.contains_key(&request.player_id) {
            return Err(MatchmakingError::conflict(format!(
                "player {} is already queued",
                request.player_id
            )));
        }

        let key = request.bucket_key();
        inner
            .by_player
            .insert(request.player_id.clone(), key.clone());

        let bucket = inner.buckets.entry(key).or_default();
        bucket.push_back(request);
        Ok(bucket.len())
    }

    fn remove(&self, player_id: &str) -> Option<WaitingRequest> {
        self.lock().ok()?.take(player_id)
    }

    fn remove_pair(&self, a: &str, b: &str) -> Result<(WaitingRequest, WaitingRequest)> {
        let mut inner = self.lock()?;

        if !inner.by_player.contains_key(a) || !inner.by_player.contains_key(b) {
            return Err(MatchmakingError::conflict(format!(
                "pairing ({}, {}) lost a participant before removal",
                a, b
            )));
        }

        let first = inner
            .take(a)
            .ok_or_else(|| MatchmakingError::internal("player index out of sync with bucket"))?;
        let second = inner
            .take(b)
            .ok_or_else(|| MatchmakingError::internal("player index out of sync with bucket"))?;

        Ok((first, second))
    }

    fn snapshot(&self, bucket: &BucketKey) -> Vec<WaitingRequest> {
        self.lock()
            .map(|inner| {
                inner
                    .buckets
                    .get(bucket)
                    .map(|b| b.iter().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn bucket_keys(&self) -> Vec<BucketKey> {
        self.lock()
            .map(|inner| inner.buckets.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn find(&self, player_id: &str) -> Option<WaitingRequest> {
        let inner = self.lock().ok()?;
        let key = inner.by_player.get(player_id)?;
        inner
            .buckets
            .get(key)?
            .iter()
            .find(|r| r.player_id == player_id)
            .cloned()
    }

    fn position(&self, player_id: &str) -> Option<usize> {
        let inner = self.lock().ok()?;
        let key = inner.by_player.get(player_id)?;
        inner
            .buckets
            .get(key)?
            .iter()
            .position(|r| r.player_id == player_id)
            .map(|i| i + 1)
    }

    fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<WaitingRequest> {
        let Ok(mut inner) = self.lock() else {
            return Vec::new();
        };

        let expired_ids: Vec<PlayerId> = inner
            .buckets
            .values()
            .flat_map(|bucket| bucket.iter())
            .filter(|r| r.is_expired(now))
            .map(|r| r.player_id.clone())
            .collect();

        expired_ids
            .iter()
            .filter_map(|id| inner.take(id))
            .collect()
    }

    fn len(&self) -> usize {
        self.lock()
            .map(|inner| inner.by_player.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{current_timestamp, generate_queue_id};
    use std::time::Duration;

    fn request(player: &str, game_type: &str, wager: u64) -> WaitingRequest {
        WaitingRequest {
            queue_id: generate_queue_id(),
            player_id: player.to_string(),
            game_type: game_type.to_string(),
            wager_amount: wager,
            skill_score: 50,
            queued_at: current_timestamp(),
            max_wait: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_add_and_position() {
        let store = InMemoryQueueStore::new();

        assert_eq!(store.add(request("p1", "coin-flip", 100)).unwrap(), 1);
        assert_eq!(store.add(request("p2", "coin-flip", 100)).unwrap(), 2);
        assert_eq!(store.position("p2"), Some(2));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_duplicate_player_rejected_across_buckets() {
        let store = InMemoryQueueStore::new();
        store.add(request("p1", "coin-flip", 100)).unwrap();

        // Same player, different bucket: still a conflict
        let err = store.add(request("p1", "dice-duel", 500)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = InMemoryQueueStore::new();
        store.add(request("p1", "coin-flip", 100)).unwrap();

        assert!(store.remove("p1").is_some());
        assert!(store.remove("p1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_pair_atomic_on_missing_side() {
        let store = InMemoryQueueStore::new();
        store.add(request("p1", "coin-flip", 100)).unwrap();

        // p2 left concurrently: p1 must stay queued
        assert!(store.remove_pair("p1", "p2").is_err());
        assert!(store.find("p1").is_some());

        store.add(request("p2", "coin-flip", 100)).unwrap();
        let (a, b) = store.remove_pair("p1", "p2").unwrap();
        assert_eq!(a.player_id, "p1");
        assert_eq!(b.player_id, "p2");
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_preserves_order() {
        let store = InMemoryQueueStore::new();
        store.add(request("p1", "coin-flip", 100)).unwrap();
        store.add(request("p2", "coin-flip", 100)).unwrap();
        store.add(request("p3", "dice-duel", 100)).unwrap();

        let bucket = BucketKey::new("coin-flip", 100);
        let snapshot = store.snapshot(&bucket);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].player_id, "p1");
        assert_eq!(snapshot[1].player_id, "p2");

        assert_eq!(store.bucket_keys().len(), 2);
    }

    #[test]
    fn test_sweep_expired() {
        let store = InMemoryQueueStore::new();

        let mut stale = request("p1", "coin-flip", 100);
        stale.queued_at = current_timestamp() - chrono::Duration::seconds(10);
        stale.max_wait = Duration::from_secs(1);
        store.add(stale).unwrap();
        store.add(request("p2", "coin-flip", 100)).unwrap();

        let expired = store.sweep_expired(current_timestamp());
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].player_id, "p1");
        assert_eq!(store.len(), 1);
        assert!(store.find("p2").is_some());
    }
}
