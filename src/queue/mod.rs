//! Waiting pool, compatibility rules, and the pairing tick

pub mod compat;
pub mod orchestrator;
pub mod store;

pub use compat::{is_match, plan_pairings, skill_tolerance, PlannedPair};
pub use orchestrator::{MatchOrchestrator, OrchestratorConfig, TickSummary};
pub use store::{InMemoryQueueStore, QueueStore};
