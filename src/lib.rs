//! Arena Matchmaker - real-time pairing service for wager-based games
//!
//! This crate provides queue-based matchmaking with skill-window pairing,
//! mutual match acceptance, direct player challenges, and AMQP event
//! fan-out for head-to-head wager games.

pub mod acceptance;
pub mod amqp;
pub mod challenge;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod queue;
pub mod reconcile;
pub mod service;
pub mod services;
pub mod types;
pub mod utils;
pub mod wait_time;

// Re-export commonly used types and traits
pub use error::{ErrorKind, MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use engine::{MatchAcceptResult, MatchmakingEngine};
pub use notify::NotificationChannel;
pub use queue::{InMemoryQueueStore, MatchOrchestrator, QueueStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
