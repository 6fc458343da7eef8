//! Error types for the matchmaking service
//!
//! Every operation exposed by the engine returns a typed failure so callers
//! can branch on kind instead of string-matching messages.

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, MatchmakingError>;

/// Coarse error classification exposed to transport adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or out-of-range input (self-challenge, bad wager, ...)
    Validation,
    /// Duplicate queue membership, duplicate challenge, already placed
    Conflict,
    /// Unknown player/match/challenge, or already removed
    NotFound,
    /// Operation attempted after a deadline passed
    Expired,
    /// Broker or backing-store failure that exhausted retries
    Transport,
    /// Invariant violation inside the service
    Internal,
}

/// Error type for all matchmaking operations
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("invalid request: {reason}")]
    Validation { reason: String },

    #[error("conflict: {reason}")]
    Conflict { reason: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("deadline passed: {what}")]
    Expired { what: String },

    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl MatchmakingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MatchmakingError::Validation { .. } => ErrorKind::Validation,
            MatchmakingError::Conflict { .. } => ErrorKind::Conflict,
            MatchmakingError::NotFound { .. } => ErrorKind::NotFound,
            MatchmakingError::Expired { .. } => ErrorKind::Expired,
            MatchmakingError::Transport { .. } => ErrorKind::Transport,
            MatchmakingError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// True when the failure is a deadline expiry
    pub fn is_expired(&self) -> bool {
        self.kind() == ErrorKind::Expired
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        MatchmakingError::Validation {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        MatchmakingError::Conflict {
            reason: reason.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        MatchmakingError::NotFound { what: what.into() }
    }

    pub fn expired(what: impl Into<String>) -> Self {
        MatchmakingError::Expired { what: what.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        MatchmakingError::Transport {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        MatchmakingError::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            MatchmakingError::validation("bad wager").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            MatchmakingError::conflict("already queued").kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            MatchmakingError::not_found("challenge").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            MatchmakingError::expired("challenge").kind(),
            ErrorKind::Expired
        );
    }

    #[test]
    fn test_error_messages_are_human_readable() {
        let err = MatchmakingError::conflict("player p1 already queued");
        assert_eq!(err.to_string(), "conflict: player p1 already queued");
    }
}
