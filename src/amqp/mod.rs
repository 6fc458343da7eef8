//! AMQP integration: broker connection and notification publishing

pub mod connection;
pub mod publisher;

pub use connection::{AmqpConfig, AmqpConnection};
pub use publisher::{
    AmqpNotificationChannel, MessageEnvelope, PublisherConfig, NOTIFICATIONS_EXCHANGE,
};
