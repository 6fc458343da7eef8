//! Configuration management for the matchmaking service
//!
//! Settings load from defaults, an optional TOML file, and environment
//! variable overrides, and are validated before use.

pub mod app;

pub use app::{
    validate_config, AmqpSettings, AppConfig, MatchmakingSettings, ServiceSettings,
};
