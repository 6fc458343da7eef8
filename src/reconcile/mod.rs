//! Disconnect handling
//!
//! A dropped connection must leave no stale matchmaking state behind: the
//! player's waiting request is removed and any in-flight pending match is
//! cancelled with the counterpart notified.

use crate::acceptance::AcceptanceTracker;
use crate::metrics::MetricsCollector;
use crate::notify::NotificationChannel;
use crate::queue::store::QueueStore;
use crate::types::{CancelReason, LeaveReason, Notification};
use std::sync::Arc;
use tracing::info;

/// Outcome of a disconnect sweep for one player
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisconnectOutcome {
    pub removed_from_queue: bool,
    pub cancelled_match: bool,
}

/// Cleans up matchmaking state when a player's connection drops
pub struct DisconnectReconciler {
    store: Arc<dyn QueueStore>,
    acceptance: Arc<AcceptanceTracker>,
    notifier: Arc<dyn NotificationChannel>,
    metrics: Arc<MetricsCollector>,
}

impl DisconnectReconciler {
    pub fn new(
        store: Arc<dyn QueueStore>,
        acceptance: Arc<AcceptanceTracker>,
        notifier: Arc<dyn NotificationChannel>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            acceptance,
            notifier,
            metrics,
        }
    }

    /// Remove all matchmaking state for a disconnected player.
    ///
    /// Safe to call for players with no state at all; the outcome reports
    /// what was actually cleaned up.
    pub async fn handle_disconnect(&self, player_id: &str) -> DisconnectOutcome {
        let mut outcome = DisconnectOutcome::default();

        if let Some(request) = self.store.remove(player_id) {
            outcome.removed_from_queue = true;
            info!(
                "Removed disconnected player {} from {}",
                player_id,
                request.bucket_key()
            );
            // Best effort: the player is gone, but some transports buffer
            let _ = self
                .notifier
                .send(
                    player_id,
                    Notification::QueueLeft {
                        reason: LeaveReason::Disconnect,
                    },
                )
                .await;
        }

        if let Some(pending) = self.acceptance.cancel_for_player(player_id) {
            outcome.cancelled_match = true;
            self.metrics.record_match_cancelled("disconnected");
            info!(
                "Cancelled pending match {} after disconnect of {}",
                pending.match_id, player_id
            );
            self.notifier
                .send_to_both(
                    &pending.players,
                    Notification::MatchCancelled {
                        reason: CancelReason::Disconnected {
                            player: player_id.to_string(),
                        },
                    },
                )
                .await;
        }

        outcome
    }
}
