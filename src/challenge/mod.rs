//! Direct player-to-player challenges
//!
//! Challenges bypass the pool queue entirely: the invite itself is the
//! challenger's consent, so a target's acceptance goes straight to game
//! creation with no separate acceptance round. This module is the single
//! owner of Challenge state.

use crate::error::{MatchmakingError, Result};
use crate::types::{Challenge, ChallengeId, ChallengeStatus, GameType, PlayerId};
use crate::utils::{current_timestamp, generate_challenge_id};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Default challenge lifetime when the caller does not give one
pub const DEFAULT_CHALLENGE_EXPIRY_SECS: i64 = 300;

/// Options for creating a challenge
#[derive(Debug, Clone, Default)]
pub struct ChallengeOptions {
    pub message: Option<String>,
    /// Lifetime in seconds; defaults to [`DEFAULT_CHALLENGE_EXPIRY_SECS`]
    pub expires_in_secs: Option<i64>,
}

#[derive(Default)]
struct RegistryInner {
    challenges: HashMap<ChallengeId, Challenge>,
    /// Ordered (challenger, target) -> active challenge index
    by_pair: HashMap<(PlayerId, PlayerId), ChallengeId>,
}

impl RegistryInner {
    fn retire(&mut self, challenge_id: &ChallengeId) -> Option<Challenge> {
        let challenge = self.challenges.remove(challenge_id)?;
        self.by_pair.remove(&(
            challenge.challenger_id.clone(),
            challenge.target_id.clone(),
        ));
        Some(challenge)
    }
}

/// Registry of outstanding direct challenges with independent expiry
#[derive(Default)]
pub struct ChallengeRegistry {
    inner: Mutex<RegistryInner>,
}

impl ChallengeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RegistryInner>> {
        self.inner
            .lock()
            .map_err(|_| MatchmakingError::internal("challenge registry lock poisoned"))
    }

    /// Create a challenge from one player to another.
    ///
    /// Player existence is the engine's concern; this registry enforces
    /// the no-self-challenge rule and the one-active-challenge-per-ordered-
    /// pair invariant.
    pub fn create(
        &self,
        challenger_id: PlayerId,
        target_id: PlayerId,
        game_type: GameType,
        wager_amount: u64,
        opts: ChallengeOptions,
    ) -> Result<Challenge> {
        if challenger_id == target_id {
            return Err(MatchmakingError::validation(
                "a player cannot challenge themselves",
            ));
        }

        let mut inner = self.lock()?;
        let pair = (challenger_id.clone(), target_id.clone());
        if inner.by_pair.contains_key(&pair) {
            return Err(MatchmakingError::conflict(format!(
                "an active challenge from {} to {} already exists",
                challenger_id, target_id
            )));
        }

        let now = current_timestamp();
        let expires_in = opts
            .expires_in_secs
            .unwrap_or(DEFAULT_CHALLENGE_EXPIRY_SECS);
        let challenge = Challenge {
            challenge_id: generate_challenge_id(),
            challenger_id,
            target_id,
            game_type,
            wager_amount,
            message: opts.message,
            created_at: now,
            expires_at: now + Duration::seconds(expires_in),
            status: ChallengeStatus::Sent,
        };

        inner.by_pair.insert(pair, challenge.challenge_id);
        inner
            .challenges
            .insert(challenge.challenge_id, challenge.clone());

        debug!(
            "Challenge {} created: {} -> {}",
            challenge.challenge_id, challenge.challenger_id, challenge.target_id
        );
        Ok(challenge)
    }

    /// Accept a challenge as its target
    pub fn accept(
        &self,
        challenge_id: ChallengeId,
        player_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Challenge> {
        let mut inner = self.lock()?;

        let challenge = inner
            .challenges
            .get_mut(&challenge_id)
            .ok_or_else(|| MatchmakingError::not_found(format!("challenge {}", challenge_id)))?;

        if challenge.target_id != player_id {
            return Err(MatchmakingError::validation(format!(
                "only the challenged player may accept challenge {}",
                challenge_id
            )));
        }

        if challenge.status != ChallengeStatus::Sent {
            return Err(MatchmakingError::conflict(format!(
                "challenge {} is no longer open",
                challenge_id
            )));
        }

        if challenge.is_expired(now) {
            challenge.status = ChallengeStatus::Expired;
            inner.retire(&challenge_id);
            return Err(MatchmakingError::expired(format!(
                "challenge {}",
                challenge_id
            )));
        }

        challenge.status = ChallengeStatus::Accepted;
        inner
            .retire(&challenge_id)
            .ok_or_else(|| MatchmakingError::internal("accepted challenge vanished"))
    }

    /// Decline a challenge as its target
    pub fn decline(&self, challenge_id: ChallengeId, player_id: &str) -> Result<Challenge> {
        let mut inner = self.lock()?;

        let challenge = inner
            .challenges
            .get_mut(&challenge_id)
            .ok_or_else(|| MatchmakingError::not_found(format!("challenge {}", challenge_id)))?;

        if challenge.target_id != player_id {
            return Err(MatchmakingError::validation(format!(
                "only the challenged player may decline challenge {}",
                challenge_id
            )));
        }

        if challenge.status != ChallengeStatus::Sent {
            return Err(MatchmakingError::conflict(format!(
                "challenge {} is no longer open",
                challenge_id
            )));
        }

        challenge.status = ChallengeStatus::Declined;
        inner
            .retire(&challenge_id)
            .ok_or_else(|| MatchmakingError::internal("declined challenge vanished"))
    }

    /// Withdraw an unanswered challenge as its sender
    pub fn revoke(&self, challenge_id: ChallengeId, player_id: &str) -> Result<Challenge> {
        let mut inner = self.lock()?;

        let challenge = inner
            .challenges
            .get_mut(&challenge_id)
            .ok_or_else(|| MatchmakingError::not_found(format!("challenge {}", challenge_id)))?;

        if challenge.challenger_id != player_id {
            return Err(MatchmakingError::validation(format!(
                "only the challenger may revoke challenge {}",
                challenge_id
            )));
        }

        if challenge.status != ChallengeStatus::Sent {
            return Err(MatchmakingError::conflict(format!(
                "challenge {} is no longer open",
                challenge_id
            )));
        }

        challenge.status = ChallengeStatus::Revoked;
        inner
            .retire(&challenge_id)
            .ok_or_else(|| MatchmakingError::internal("revoked challenge vanished"))
    }

    /// Remove and return every challenge past its expiry, marked expired
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<Challenge> {
        let Ok(mut inner) = self.lock() else {
            return Vec::new();
        };

        let expired_ids: Vec<ChallengeId> = inner
            .challenges
            .values()
            .filter(|c| c.is_expired(now))
            .map(|c| c.challenge_id)
            .collect();

        expired_ids
            .into_iter()
            .filter_map(|id| {
                if let Some(challenge) = inner.challenges.get_mut(&id) {
                    challenge.status = ChallengeStatus::Expired;
                }
                inner.retire(&id)
            })
            .collect()
    }

    pub fn get(&self, challenge_id: ChallengeId) -> Option<Challenge> {
        self.lock().ok()?.challenges.get(&challenge_id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.lock().map(|inner| inner.challenges.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn create(registry: &ChallengeRegistry, from: &str, to: &str) -> Challenge {
        registry
            .create(
                from.to_string(),
                to.to_string(),
                "coin-flip".to_string(),
                100,
                ChallengeOptions::default(),
            )
            .unwrap()
    }

    #[test]
    fn test_self_challenge_rejected() {
        let registry = ChallengeRegistry::new();
        let err = registry
            .create(
                "a".to_string(),
                "a".to_string(),
                "coin-flip".to_string(),
                100,
                ChallengeOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_duplicate_ordered_pair_rejected() {
        let registry = ChallengeRegistry::new();
        create(&registry, "a", "b");

        let err = registry
            .create(
                "a".to_string(),
                "b".to_string(),
                "dice-duel".to_string(),
                500,
                ChallengeOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // Reverse direction is a different ordered pair
        assert!(registry
            .create(
                "b".to_string(),
                "a".to_string(),
                "coin-flip".to_string(),
                100,
                ChallengeOptions::default(),
            )
            .is_ok());
    }

    #[test]
    fn test_accept_happy_path() {
        let registry = ChallengeRegistry::new();
        let challenge = create(&registry, "a", "b");

        let accepted = registry
            .accept(challenge.challenge_id, "b", current_timestamp())
            .unwrap();
        assert_eq!(accepted.status, ChallengeStatus::Accepted);
        assert_eq!(registry.active_count(), 0);

        // The pair frees up for a new challenge
        assert!(create(&registry, "a", "b").is_active());
    }

    #[test]
    fn test_only_target_may_accept() {
        let registry = ChallengeRegistry::new();
        let challenge = create(&registry, "a", "b");

        let err = registry
            .accept(challenge.challenge_id, "a", current_timestamp())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_accept_after_expiry_fails() {
        let registry = ChallengeRegistry::new();
        let challenge = registry
            .create(
                "a".to_string(),
                "b".to_string(),
                "coin-flip".to_string(),
                100,
                ChallengeOptions {
                    message: None,
                    expires_in_secs: Some(300),
                },
            )
            .unwrap();

        let after_expiry = challenge.expires_at + Duration::seconds(1);
        let err = registry
            .accept(challenge.challenge_id, "b", after_expiry)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Expired);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_decline_and_revoke() {
        let registry = ChallengeRegistry::new();
        let challenge = create(&registry, "a", "b");

        // Challenger cannot decline their own invite
        assert_eq!(
            registry
                .decline(challenge.challenge_id, "a")
                .unwrap_err()
                .kind(),
            ErrorKind::Validation
        );

        let declined = registry.decline(challenge.challenge_id, "b").unwrap();
        assert_eq!(declined.status, ChallengeStatus::Declined);

        let challenge = create(&registry, "a", "b");
        let revoked = registry.revoke(challenge.challenge_id, "a").unwrap();
        assert_eq!(revoked.status, ChallengeStatus::Revoked);
    }

    #[test]
    fn test_unknown_challenge_not_found() {
        let registry = ChallengeRegistry::new();
        let err = registry
            .accept(generate_challenge_id(), "b", current_timestamp())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_sweep_expired() {
        let registry = ChallengeRegistry::new();
        let stale = registry
            .create(
                "a".to_string(),
                "b".to_string(),
                "coin-flip".to_string(),
                100,
                ChallengeOptions {
                    message: None,
                    expires_in_secs: Some(-1),
                },
            )
            .unwrap();
        create(&registry, "c", "d");

        let swept = registry.sweep_expired(current_timestamp());
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].challenge_id, stale.challenge_id);
        assert_eq!(swept[0].status, ChallengeStatus::Expired);
        assert_eq!(registry.active_count(), 1);
    }
}
