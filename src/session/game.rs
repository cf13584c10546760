use std::net::SocketAddr;

use log::info;

use super::{Handler, Menu, Reply};
use crate::auth::Identity;
use crate::errors::{ServerError, ServerResult};
use crate::games::GameId;
use crate::protocol::{
    parse_payload, AnswerReview, GameResultsResponse, LeaveGameResponse, PlayerResult,
    QuestionResponse, Request, RequestKind, ResponseKind, SubmitAnswerRequest,
    SubmitAnswerResponse,
};
use crate::Context;

/// A player inside a running game. Holds the game's id and re-resolves it
/// through the registry on each request.
pub struct InGame {
    user: Identity,
    game_id: GameId,
}

impl InGame {
    pub fn new(user: Identity, game_id: GameId) -> Self {
        Self { user, game_id }
    }

    pub async fn handle(
        &mut self,
        context: &Context,
        request: &Request,
        peer: SocketAddr,
    ) -> ServerResult<Reply> {
        match request.kind {
            RequestKind::GetQuestion => self.get_question(context, peer).await,
            RequestKind::SubmitAnswer => self.submit_answer(context, &request.payload, peer).await,
            RequestKind::GameResults => self.game_results(context).await,
            RequestKind::LeaveGame => {
                let status = self.leave(context, peer).await;

                Reply::with_next(
                    ResponseKind::LeaveGame,
                    &LeaveGameResponse { status },
                    Handler::Menu(Menu::new(self.user.clone())),
                )
            }
            RequestKind::Disconnect => {
                info!(
                    "Player '{}' has disconnected, leaving game '{}' ({})",
                    self.user.username, self.game_id, peer
                );

                self.leave(context, peer).await;
                context.auth.logout(&self.user.username);

                Ok(Reply::empty())
            }
            _ => Err(ServerError::Unauthorized),
        }
    }

    /// Removes the player from both the game and its room. Fine to call when
    /// either is already gone.
    async fn leave(&self, context: &Context, peer: SocketAddr) -> bool {
        let _ = context
            .games
            .remove_player_by_id(&self.game_id, &self.user)
            .await;

        // The game shares its id with the room it came from
        context.rooms.remove_member(&self.game_id, &self.user);

        info!(
            "Player '{}' left game '{}' ({})",
            self.user.username, self.game_id, peer
        );

        true
    }

    async fn get_question(&self, context: &Context, peer: SocketAddr) -> ServerResult<Reply> {
        let game = context.games.game(&self.game_id)?;
        let (question_index, question) = game.current_question()?;

        info!(
            "Player '{}' got question {} ({})",
            self.user.username, question_index, peer
        );

        Reply::new(
            ResponseKind::GetQuestion,
            &QuestionResponse {
                status: true,
                question_index,
                question: question.prompt().to_string(),
                answers: question.answer_map(),
            },
        )
    }

    async fn submit_answer(
        &self,
        context: &Context,
        payload: &[u8],
        peer: SocketAddr,
    ) -> ServerResult<Reply> {
        let request: SubmitAnswerRequest = parse_payload(payload)?;
        let game = context.games.game(&self.game_id)?;

        if game.is_finished() {
            return Err(ServerError::InvalidRequest(
                "Game is already finished".to_string(),
            ));
        }

        // This call holds the response back until the reveal boundary
        let correct_answer_index = game
            .submit_answer(&self.user, request.answer_index, request.question_index)
            .await?;

        info!(
            "Player '{}' submitted answer for question {} ({})",
            self.user.username, request.question_index, peer
        );

        Reply::new(
            ResponseKind::SubmitAnswer,
            &SubmitAnswerResponse {
                status: true,
                correct_answer_index,
            },
        )
    }

    async fn game_results(&self, context: &Context) -> ServerResult<Reply> {
        let game = context.games.game(&self.game_id)?;

        if !game.is_finished() {
            return Err(ServerError::InvalidRequest(
                "Game is not yet finished".to_string(),
            ));
        }

        let mut players = Vec::new();
        let mut own_answers = Vec::new();

        for (identity, record) in game.results() {
            let summary = context
                .storage
                .player_by_username(&identity.username)
                .await?;

            players.push(PlayerResult {
                username: summary.username,
                avatar_color: summary.avatar_color,
                is_online: game.is_online(&identity),
                score_change: record.score_change(),
                correct_answers: record.correct_answers(),
                wrong_answers: record.wrong_answers(),
                average_answer_time: record.average_answer_time(),
            });

            if identity == self.user {
                own_answers = record
                    .questions()
                    .iter()
                    .zip(record.answers())
                    .map(|(question, (chosen_index, answer_time))| AnswerReview {
                        question: question.prompt().to_string(),
                        answers: question.answer_map(),
                        chosen_index: *chosen_index,
                        correct_index: question.correct_index(),
                        answer_time: *answer_time,
                    })
                    .collect();
            }
        }

        Reply::new(
            ResponseKind::GameResults,
            &GameResultsResponse {
                status: true,
                answers: own_answers,
                players,
            },
        )
    }
}
