//! AMQP-backed notification delivery
//!
//! Player notifications publish to a topic exchange with routing keys of
//! the form `player.<player_id>.<event-name>`, so consumers can bind per
//! player, per event kind, or both.

use crate::error::{MatchmakingError, Result};
use crate::notify::NotificationChannel;
use crate::types::Notification;
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Default exchange for outbound player notifications
pub const NOTIFICATIONS_EXCHANGE: &str = "matchmaking.events";

/// Message envelope with delivery metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: Serialize + serde::de::DeserializeOwned,
{
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            routing_key,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| MatchmakingError::internal(format!("Failed to serialize message: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            MatchmakingError::validation(format!("Failed to deserialize message: {}", e))
        })
    }
}

/// Publish behavior settings
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub exchange_name: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub enable_deduplication: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            exchange_name: NOTIFICATIONS_EXCHANGE.to_string(),
            max_retries: 3,
            retry_delay_ms: 500,
            enable_deduplication: true,
        }
    }
}

/// NotificationChannel backed by an AMQP topic exchange
pub struct AmqpNotificationChannel {
    channel: Channel,
    config: PublisherConfig,
    /// Correlation ids already published, guarding against redelivery
    published: Mutex<HashSet<String>>,
}

impl AmqpNotificationChannel {
    /// Declare the exchange and wrap the channel
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        let publisher = Self {
            channel,
            config,
            published: Mutex::new(HashSet::new()),
        };
        publisher.setup_exchange().await?;
        Ok(publisher)
    }

    async fn setup_exchange(&self) -> Result<()> {
        let args = ExchangeDeclareArguments::new(&self.config.exchange_name, "topic");
        self.channel.exchange_declare(args).await.map_err(|e| {
            MatchmakingError::transport(format!(
                "Failed to declare exchange {}: {}",
                self.config.exchange_name, e
            ))
        })?;

        info!("Declared AMQP exchange {}", self.config.exchange_name);
        Ok(())
    }

    fn routing_key(player_id: &str, event: &Notification) -> String {
        format!("player.{}.{}", player_id, event.name())
    }

    async fn publish_with_retry(&self, envelope: &MessageEnvelope<Notification>) -> Result<()> {
        if self.config.enable_deduplication {
            let published = self
                .published
                .lock()
                .map_err(|_| MatchmakingError::internal("publish cache lock poisoned"))?;
            if published.contains(&envelope.correlation_id) {
                debug!(
                    "Message {} already published, skipping",
                    envelope.correlation_id
                );
                return Ok(());
            }
        }

        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(envelope).await {
                Ok(()) => {
                    if self.config.enable_deduplication {
                        if let Ok(mut published) = self.published.lock() {
                            published.insert(envelope.correlation_id.clone());
                        }
                    }
                    debug!(
                        "Published {} with routing key {}",
                        envelope.correlation_id, envelope.routing_key
                    );
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} failed for {}: {}. Retrying in {:?}",
                        retry_count, envelope.correlation_id, e, delay
                    );
                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }

    async fn try_publish(&self, envelope: &MessageEnvelope<Notification>) -> Result<()> {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(&self.config.exchange_name, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| MatchmakingError::transport(format!("Failed to publish: {}", e)))
    }

    /// Clear the deduplication cache
    pub fn clear_deduplication_cache(&self) {
        if let Ok(mut published) = self.published.lock() {
            published.clear();
        }
    }

    /// Number of cached correlation ids
    pub fn cached_message_count(&self) -> usize {
        self.published.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}

#[async_trait]
impl NotificationChannel for AmqpNotificationChannel {
    async fn send(&self, player_id: &str, event: Notification) -> Result<()> {
        let routing_key = Self::routing_key(player_id, &event);
        let envelope = MessageEnvelope::new(event, routing_key);
        self.publish_with_retry(&envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_config_default() {
        let config = PublisherConfig::default();
        assert_eq!(config.exchange_name, NOTIFICATIONS_EXCHANGE);
        assert_eq!(config.max_retries, 3);
        assert!(config.enable_deduplication);
    }

    #[test]
    fn test_routing_key_shape() {
        let event = Notification::Timeout { waited_secs: 30 };
        assert_eq!(
            AmqpNotificationChannel::routing_key("p1", &event),
            "player.p1.timeout"
        );
    }

    #[test]
    fn test_envelope_round_trip() {
        let event = Notification::QueueLeft {
            reason: crate::types::LeaveReason::UserQuit,
        };
        let envelope = MessageEnvelope::new(event, "player.p1.queue-left".to_string());

        let bytes = envelope.to_bytes().unwrap();
        let decoded: MessageEnvelope<Notification> = MessageEnvelope::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.correlation_id, envelope.correlation_id);
        assert_eq!(decoded.routing_key, "player.p1.queue-left");
        assert_eq!(decoded.payload.name(), "queue-left");
    }
}
