//! Utility functions for the matchmaking service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique challenge ID
pub fn generate_challenge_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique queue entry ID
pub fn generate_queue_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Absolute difference between two 0-100 skill scores
pub fn skill_difference(a: u8, b: u8) -> u8 {
    a.abs_diff(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        assert_ne!(generate_match_id(), generate_match_id());
        assert_ne!(generate_challenge_id(), generate_challenge_id());
        assert_ne!(generate_queue_id(), generate_queue_id());
    }

    #[test]
    fn test_skill_difference() {
        assert_eq!(skill_difference(50, 70), 20);
        assert_eq!(skill_difference(70, 50), 20);
        assert_eq!(skill_difference(50, 50), 0);
    }
}
