//! Player notification fan-out
//!
//! Delivery is transport-agnostic: the engine only ever calls
//! `send(player, event)`. Production wires the AMQP-backed channel from
//! [`crate::amqp`]; tests use the recording mock below.

use crate::error::Result;
use crate::types::Notification;
use async_trait::async_trait;
use tracing::warn;

/// Trait for delivering matchmaking events to players
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver one event to one player
    async fn send(&self, player_id: &str, event: Notification) -> Result<()>;

    /// Deliver the same event to both sides of a pairing.
    /// A failure for one player must not suppress delivery to the other.
    async fn send_to_both(&self, players: &[String; 2], event: Notification) {
        for player in players {
            if let Err(e) = self.send(player, event.clone()).await {
                warn!("Failed to notify {}: {}", player, e);
            }
        }
    }
}

/// Mock notification channel for testing
#[derive(Debug, Default)]
pub struct MockNotificationChannel {
    sent: std::sync::Mutex<Vec<(String, Notification)>>,
}

impl MockNotificationChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// All (player, event) pairs delivered so far
    pub fn sent_events(&self) -> Vec<(String, Notification)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Events delivered to one player
    pub fn events_for(&self, player_id: &str) -> Vec<Notification> {
        self.sent_events()
            .into_iter()
            .filter(|(p, _)| p == player_id)
            .map(|(_, e)| e)
            .collect()
    }

    /// Count of events with the given name across all players
    pub fn count_events_of_type(&self, name: &str) -> usize {
        self.sent_events()
            .iter()
            .filter(|(_, e)| e.name() == name)
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

#[async_trait]
impl NotificationChannel for MockNotificationChannel {
    async fn send(&self, player_id: &str, event: Notification) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((player_id.to_string(), event));
        }
        Ok(())
    }
}
