//! External collaborators consumed by the engine
//!
//! Game creation and player lookup are owned by other services; the engine
//! only sees these traits. Mock implementations live here so the engine and
//! integration tests can run without the real backends.

use crate::error::{MatchmakingError, Result};
use crate::types::{Game, GameId, GameOptions, PlayerId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// External game-creation collaborator
#[async_trait]
pub trait GameService: Send + Sync {
    /// Create a game on behalf of a player
    async fn create_game(&self, player_id: &str, opts: GameOptions) -> Result<Game>;

    /// Join an existing game
    async fn join_game(&self, player_id: &str, game_id: GameId) -> Result<Game>;
}

/// External player lookup: existence and skill score
#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    /// Normalized 0-100 skill score; `NotFound` for unknown players
    async fn skill_score(&self, player_id: &str) -> Result<u8>;
}

/// In-memory game service for tests
#[derive(Debug, Default)]
pub struct MockGameService {
    games: Mutex<HashMap<GameId, Game>>,
    joins: Mutex<Vec<(PlayerId, GameId)>>,
}

impl MockGameService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created_count(&self) -> usize {
        self.games.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn joins(&self) -> Vec<(PlayerId, GameId)> {
        self.joins.lock().map(|j| j.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GameService for MockGameService {
    async fn create_game(&self, _player_id: &str, opts: GameOptions) -> Result<Game> {
        let game = Game {
            game_id: uuid::Uuid::new_v4(),
            game_type: opts.game_type,
            wager_amount: opts.wager_amount,
        };

        self.games
            .lock()
            .map_err(|_| MatchmakingError::internal("mock game store lock poisoned"))?
            .insert(game.game_id, game.clone());
        Ok(game)
    }

    async fn join_game(&self, player_id: &str, game_id: GameId) -> Result<Game> {
        let game = self
            .games
            .lock()
            .map_err(|_| MatchmakingError::internal("mock game store lock poisoned"))?
            .get(&game_id)
            .cloned()
            .ok_or_else(|| MatchmakingError::not_found(format!("game {}", game_id)))?;

        if let Ok(mut joins) = self.joins.lock() {
            joins.push((player_id.to_string(), game_id));
        }
        Ok(game)
    }
}

/// Static player directory for tests and single-process deployments.
///
/// Registered players return their stored score; with `open_enrollment`
/// every unknown player resolves to the default score instead of NotFound.
#[derive(Debug)]
pub struct StaticPlayerDirectory {
    scores: Mutex<HashMap<PlayerId, u8>>,
    open_enrollment: bool,
    default_score: u8,
}

impl Default for StaticPlayerDirectory {
    fn default() -> Self {
        Self {
            scores: Mutex::new(HashMap::new()),
            open_enrollment: false,
            default_score: 50,
        }
    }
}

impl StaticPlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory that accepts any player id at the default score
    pub fn open() -> Self {
        Self {
            open_enrollment: true,
            ..Self::default()
        }
    }

    pub fn register(&self, player_id: impl Into<PlayerId>, score: u8) {
        if let Ok(mut scores) = self.scores.lock() {
            scores.insert(player_id.into(), score.min(100));
        }
    }
}

#[async_trait]
impl PlayerDirectory for StaticPlayerDirectory {
    async fn skill_score(&self, player_id: &str) -> Result<u8> {
        let known = self
            .scores
            .lock()
            .map_err(|_| MatchmakingError::internal("directory lock poisoned"))?
            .get(player_id)
            .copied();

        match known {
            Some(score) => Ok(score),
            None if self.open_enrollment => Ok(self.default_score),
            None => Err(MatchmakingError::not_found(format!(
                "player {}",
                player_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_mock_game_service_create_and_join() {
        let service = MockGameService::new();

        let game = service
            .create_game(
                "a",
                GameOptions {
                    game_type: "coin-flip".to_string(),
                    wager_amount: 100,
                    is_private: false,
                },
            )
            .await
            .unwrap();

        let joined = service.join_game("b", game.game_id).await.unwrap();
        assert_eq!(joined.game_id, game.game_id);
        assert_eq!(service.created_count(), 1);
        assert_eq!(service.joins(), vec![("b".to_string(), game.game_id)]);

        let err = service
            .join_game("c", uuid::Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_directory_lookup() {
        let directory = StaticPlayerDirectory::new();
        directory.register("a", 72);

        assert_eq!(directory.skill_score("a").await.unwrap(), 72);
        assert_eq!(
            directory.skill_score("ghost").await.unwrap_err().kind(),
            ErrorKind::NotFound
        );

        let open = StaticPlayerDirectory::open();
        assert_eq!(open.skill_score("anyone").await.unwrap(), 50);
    }
}
