//! Acceptance tracking for found pairings
//!
//! A PendingMatch sits between match-found and game creation: both players
//! must confirm before the 30 second deadline or the match is cancelled.
//! This module is the single owner of PendingMatch state; side effects
//! (notifications, game creation) are driven by the engine from the
//! outcomes returned here.

use crate::error::{MatchmakingError, Result};
use crate::types::{CancelReason, MatchId, MatchStatus, PendingMatch, PlayerId};
use crate::utils::{current_timestamp, generate_match_id};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Outcome of recording one player's acceptance
#[derive(Debug, Clone)]
pub enum AcceptOutcome {
    /// This side accepted; the opponent has not yet
    AwaitingOpponent(PendingMatch),
    /// Both sides accepted before the deadline
    Confirmed(PendingMatch),
}

#[derive(Default)]
struct TrackerInner {
    matches: HashMap<MatchId, PendingMatch>,
    /// Player -> match index enforcing one pending match per player
    by_player: HashMap<PlayerId, MatchId>,
}

impl TrackerInner {
    fn discard(&mut self, match_id: &MatchId) -> Option<PendingMatch> {
        let pending = self.matches.remove(match_id)?;
        for player in &pending.players {
            self.by_player.remove(player);
        }
        Some(pending)
    }
}

/// Per-match state machine collecting both players' confirmations
#[derive(Default)]
pub struct AcceptanceTracker {
    inner: Mutex<TrackerInner>,
}

impl AcceptanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, TrackerInner>> {
        self.inner
            .lock()
            .map_err(|_| MatchmakingError::internal("acceptance tracker lock poisoned"))
    }

    /// Create a pending match for a freshly removed pair
    pub fn create(
        &self,
        players: [PlayerId; 2],
        game_type: String,
        wager_amount: u64,
        accept_deadline: DateTime<Utc>,
    ) -> Result<PendingMatch> {
        if players[0] == players[1] {
            return Err(MatchmakingError::validation(
                "a match requires two distinct players",
            ));
        }

        let mut inner = self.lock()?;
        for player in &players {
            if inner.by_player.contains_key(player) {
                return Err(MatchmakingError::conflict(format!(
                    "player {} already has a pending match",
                    player
                )));
            }
        }

        let pending = PendingMatch {
            match_id: generate_match_id(),
            players: players.clone(),
            game_type,
            wager_amount,
            created_at: current_timestamp(),
            accept_deadline,
            status: MatchStatus::AwaitingAcceptance,
            accepted: Vec::new(),
        };

        for player in &players {
            inner.by_player.insert(player.clone(), pending.match_id);
        }
        inner.matches.insert(pending.match_id, pending.clone());

        debug!(
            "Pending match {} created for {} vs {}",
            pending.match_id, pending.players[0], pending.players[1]
        );
        Ok(pending)
    }

    /// Record one player's acceptance.
    ///
    /// A confirmed or expired match is removed from the tracker; the engine
    /// takes over from the returned state.
    pub fn accept(
        &self,
        match_id: MatchId,
        player_id: &str,
        now: DateTime<Utc>,
    ) -> Result<AcceptOutcome> {
        let mut inner = self.lock()?;

        let pending = inner
            .matches
            .get_mut(&match_id)
            .ok_or_else(|| MatchmakingError::not_found(format!("match {}", match_id)))?;

        if !pending.involves(player_id) {
            return Err(MatchmakingError::validation(format!(
                "player {} is not part of match {}",
                player_id, match_id
            )));
        }

        if pending.is_terminal() {
            return Err(MatchmakingError::conflict(format!(
                "match {} is already {}",
                match_id, pending.status
            )));
        }

        if now > pending.accept_deadline {
            pending.status = MatchStatus::Cancelled;
            let cancelled = inner.discard(&match_id);
            debug_assert!(cancelled.is_some());
            return Err(MatchmakingError::expired(format!("match {}", match_id)));
        }

        if !pending.accepted.iter().any(|p| p == player_id) {
            pending.accepted.push(player_id.to_string());
        }

        if pending.accepted.len() == 2 {
            pending.status = MatchStatus::Confirmed;
            let confirmed = inner
                .discard(&match_id)
                .ok_or_else(|| MatchmakingError::internal("confirmed match vanished"))?;
            Ok(AcceptOutcome::Confirmed(confirmed))
        } else {
            Ok(AcceptOutcome::AwaitingOpponent(pending.clone()))
        }
    }

    /// Cancel a match because one participant declined
    pub fn decline(&self, match_id: MatchId, player_id: &str) -> Result<PendingMatch> {
        let mut inner = self.lock()?;

        let pending = inner
            .matches
            .get_mut(&match_id)
            .ok_or_else(|| MatchmakingError::not_found(format!("match {}", match_id)))?;

        if !pending.involves(player_id) {
            return Err(MatchmakingError::validation(format!(
                "player {} is not part of match {}",
                player_id, match_id
            )));
        }

        if pending.is_terminal() {
            return Err(MatchmakingError::conflict(format!(
                "match {} is already {}",
                match_id, pending.status
            )));
        }

        pending.status = MatchStatus::Cancelled;
        inner
            .discard(&match_id)
            .ok_or_else(|| MatchmakingError::internal("declined match vanished"))
    }

    /// Cancel whatever pending match a player is part of, if any.
    /// Used by the disconnect reconciler as an implicit decline.
    pub fn cancel_for_player(&self, player_id: &str) -> Option<PendingMatch> {
        let mut inner = self.lock().ok()?;
        let match_id = *inner.by_player.get(player_id)?;

        if let Some(pending) = inner.matches.get_mut(&match_id) {
            pending.status = MatchStatus::Cancelled;
        }
        inner.discard(&match_id)
    }

    /// Remove and return every match whose deadline has passed,
    /// marked cancelled with the timeout reason attached by the caller
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<(PendingMatch, CancelReason)> {
        let Ok(mut inner) = self.lock() else {
            return Vec::new();
        };

        let expired_ids: Vec<MatchId> = inner
            .matches
            .values()
            .filter(|m| now > m.accept_deadline)
            .map(|m| m.match_id)
            .collect();

        expired_ids
            .into_iter()
            .filter_map(|id| {
                if let Some(pending) = inner.matches.get_mut(&id) {
                    pending.status = MatchStatus::Cancelled;
                }
                inner
                    .discard(&id)
                    .map(|m| (m, CancelReason::AcceptTimeout))
            })
            .collect()
    }

    pub fn get(&self, match_id: MatchId) -> Option<PendingMatch> {
        self.lock().ok()?.matches.get(&match_id).cloned()
    }

    pub fn contains_player(&self, player_id: &str) -> bool {
        self.lock()
            .map(|inner| inner.by_player.contains_key(player_id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.matches.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
