//! Compatibility rules for pairing waiting players
//!
//! Pure decision functions over an immutable snapshot: the caller applies
//! the returned pairing decisions atomically against the store, so no lock
//! is held while this logic runs.

use crate::types::WaitingRequest;
use crate::utils::skill_difference;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Skill tolerance for a given wait time. Relaxes in steps so early
/// pairings stay fair while long waits never queue indefinitely:
/// ±20 under a minute, ±30 under two, ±40 under five, then anyone.
pub fn skill_tolerance(wait: Duration) -> Option<u8> {
    match wait.as_secs() {
        0..=59 => Some(20),
        60..=119 => Some(30),
        120..=299 => Some(40),
        _ => None,
    }
}

/// Whether two waiting requests may be paired right now.
///
/// Game type and wager must match exactly (no banding); the skill window
/// is taken from the longer-waiting side.
pub fn is_match(a: &WaitingRequest, b: &WaitingRequest, now: DateTime<Utc>) -> bool {
    if a.game_type != b.game_type || a.wager_amount != b.wager_amount {
        return false;
    }

    let longer_wait = a.wait_time(now).max(b.wait_time(now));
    match skill_tolerance(longer_wait) {
        Some(tolerance) => skill_difference(a.skill_score, b.skill_score) <= tolerance,
        None => true,
    }
}

/// A pairing decision produced from a snapshot
#[derive(Debug, Clone)]
pub struct PlannedPair {
    pub first: WaitingRequest,
    pub second: WaitingRequest,
}

/// Plan pairings for one bucket.
///
/// The snapshot is sorted oldest-first with a secondary preference for
/// near-median skill, then the head is repeatedly taken as an anchor and
/// at most `scan_window` following candidates are scanned for the first
/// compatible one. An anchor that finds no partner among those ends
/// planning for the bucket, bounding per-tick work to O(n * scan_window).
pub fn plan_pairings(
    mut snapshot: Vec<WaitingRequest>,
    now: DateTime<Utc>,
    scan_window: usize,
) -> Vec<PlannedPair> {
    snapshot.sort_by(|a, b| {
        b.wait_time(now)
            .cmp(&a.wait_time(now))
            .then_with(|| skill_difference(a.skill_score, 50).cmp(&skill_difference(b.skill_score, 50)))
    });

    let mut pairs = Vec::new();
    let mut pool: std::collections::VecDeque<WaitingRequest> = snapshot.into();

    while pool.len() >= 2 {
        let Some(anchor) = pool.pop_front() else {
            break;
        };

        let partner = pool
            .iter()
            .take(scan_window)
            .position(|candidate| is_match(&anchor, candidate, now))
            .and_then(|idx| pool.remove(idx));

        match partner {
            Some(partner) => pairs.push(PlannedPair {
                first: anchor,
                second: partner,
            }),
            None => break,
        }
    }

    pairs
}
