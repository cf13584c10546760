use std::collections::HashMap;
use std::sync::Arc;

use log::warn;
use parking_lot::RwLock;

mod game;
mod question;
mod record;

pub use game::*;
pub use question::*;
pub use record::*;

use crate::auth::Identity;
use crate::errors::{ServerError, ServerResult};
use crate::rooms::Room;
use crate::store::{Storage, StorageError};

/// Owns every in-progress game, keyed by the id of the room that started it.
pub struct GameManager {
    storage: Arc<dyn Storage>,
    games: RwLock<HashMap<GameId, Arc<Game>>>,
}

impl GameManager {
    pub fn new(storage: &Arc<dyn Storage>) -> Arc<Self> {
        Arc::new(Self {
            storage: storage.clone(),
            games: Default::default(),
        })
    }

    /// Starts a game from a room's roster and settings. Fails without side
    /// effects when the question bank cannot supply a full set.
    pub async fn create(&self, room: &Room) -> ServerResult<Arc<Game>> {
        let data = room.data();

        let rows = self
            .storage
            .questions(data.question_count)
            .await
            .map_err(|e| match e {
                StorageError::NotFound { .. } => ServerError::NotFound {
                    resource: "Questions",
                },
                e => ServerError::Storage(e),
            })?;

        let questions = rows.into_iter().map(Question::new).collect();

        let game = Arc::new(Game::new(
            data.id.clone(),
            questions,
            room.members(),
            data.time_per_question,
        ));

        self.games.write().insert(data.id, game.clone());

        Ok(game)
    }

    pub fn game(&self, id: &str) -> ServerResult<Arc<Game>> {
        self.games
            .read()
            .get(id)
            .cloned()
            .ok_or(ServerError::NotFound { resource: "Game" })
    }

    /// Takes a player out of a game. Leaving an unfinished game punishes the
    /// player and persists their results right away, since their tally cannot
    /// be recomputed once the game moves on without them. Once the game is
    /// finished, everyone not yet persisted is flushed instead. The game is
    /// dropped when its last online player leaves.
    pub async fn remove_player(&self, game: &Arc<Game>, user: &Identity) {
        let finished = game.is_finished();

        if !finished {
            game.punish(user);
        }

        game.remove_online(user);

        if !finished {
            self.persist_player(game, user).await;
        } else {
            self.persist_all(game).await;
        }

        if game.online_count() == 0 {
            self.games.write().remove(game.id());
        }
    }

    pub async fn remove_player_by_id(&self, id: &str, user: &Identity) -> ServerResult<()> {
        let game = self.game(id)?;
        self.remove_player(&game, user).await;

        Ok(())
    }

    /// Writes one player's results, at most once per game. A failed write is
    /// logged and swallowed so it never blocks a departure.
    async fn persist_player(&self, game: &Arc<Game>, user: &Identity) {
        if !game.mark_persisted(user) {
            return;
        }

        let Some(record) = game.record(user) else {
            return;
        };

        if let Err(e) = self
            .storage
            .submit_game_result(record.outcome(), &user.username)
            .await
        {
            warn!(
                "Failed to persist game results for '{}': {}",
                user.username, e
            );
        }
    }

    async fn persist_all(&self, game: &Arc<Game>) {
        for (player, _) in game.results() {
            self.persist_player(game, &player).await;
        }
    }
}
