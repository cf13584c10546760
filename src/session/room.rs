use std::net::SocketAddr;

use log::info;

use super::{player_summaries, Handler, InGame, Menu, Reply};
use crate::auth::Identity;
use crate::errors::{ServerError, ServerResult};
use crate::protocol::{
    CloseRoomResponse, LeaveRoomResponse, Request, RequestKind, ResponseKind, RoomStateResponse,
    StartGameResponse,
};
use crate::rooms::RoomId;
use crate::Context;

/// The creator of a room, waiting for enough players to start the game.
/// Holds the room's id and re-resolves it through the registry on each use.
pub struct RoomAdmin {
    user: Identity,
    room_id: RoomId,
}

impl RoomAdmin {
    pub fn new(user: Identity, room_id: RoomId) -> Self {
        Self { user, room_id }
    }

    pub async fn handle(
        &mut self,
        context: &Context,
        request: &Request,
        peer: SocketAddr,
    ) -> ServerResult<Reply> {
        match request.kind {
            RequestKind::CloseRoom => self.close_room(context, peer),
            RequestKind::StartGame => self.start_game(context, peer).await,
            RequestKind::RoomState => self.room_state(context).await,
            RequestKind::Disconnect => {
                // The admin is gone, so the room closes with them
                info!(
                    "Admin '{}' has disconnected, closing room '{}' ({})",
                    self.user.username, self.room_id, peer
                );

                context.rooms.delete(&self.room_id);
                context.auth.logout(&self.user.username);

                Ok(Reply::empty())
            }
            _ => Err(ServerError::Unauthorized),
        }
    }

    fn close_room(&self, context: &Context, peer: SocketAddr) -> ServerResult<Reply> {
        info!(
            "Admin '{}' closed room '{}' ({})",
            self.user.username, self.room_id, peer
        );

        context.rooms.delete(&self.room_id);

        Reply::with_next(
            ResponseKind::CloseRoom,
            &CloseRoomResponse { status: true },
            Handler::Menu(Menu::new(self.user.clone())),
        )
    }

    async fn start_game(&self, context: &Context, peer: SocketAddr) -> ServerResult<Reply> {
        let room = context.rooms.room(&self.room_id)?;

        if room.member_count() <= 1 {
            return Err(ServerError::NotEnoughPlayers);
        }

        let game = context.games.create(&room).await?;

        // The room only shows as active once the game actually exists
        room.set_active();

        info!(
            "Admin '{}' started game '{}' ({})",
            self.user.username, self.room_id, peer
        );

        Reply::with_next(
            ResponseKind::StartGame,
            &StartGameResponse { status: true },
            Handler::InGame(InGame::new(self.user.clone(), game.id().to_string())),
        )
    }

    async fn room_state(&self, context: &Context) -> ServerResult<Reply> {
        let room = context.rooms.room(&self.room_id)?;
        let data = room.data();
        let players = player_summaries(context, &room.members()).await?;

        Reply::new(
            ResponseKind::RoomState,
            &RoomStateResponse {
                status: true,
                has_game_begun: data.active,
                players,
                question_count: data.question_count,
                answer_timeout: data.time_per_question,
                max_players: data.max_players,
                is_closed: false,
            },
        )
    }
}

/// A user waiting inside someone else's room. Polls the room state to find
/// out when the game starts or the room disappears.
pub struct RoomMember {
    user: Identity,
    room_id: RoomId,
}

impl RoomMember {
    pub fn new(user: Identity, room_id: RoomId) -> Self {
        Self { user, room_id }
    }

    pub async fn handle(
        &mut self,
        context: &Context,
        request: &Request,
        peer: SocketAddr,
    ) -> ServerResult<Reply> {
        match request.kind {
            RequestKind::LeaveRoom => self.leave_room(context, peer).await,
            RequestKind::RoomState => self.room_state(context, peer).await,
            RequestKind::Disconnect => {
                info!(
                    "Member '{}' has disconnected, leaving room '{}' ({})",
                    self.user.username, self.room_id, peer
                );

                self.leave(context).await;
                context.auth.logout(&self.user.username);

                Ok(Reply::empty())
            }
            _ => Err(ServerError::Unauthorized),
        }
    }

    /// Takes the user out of the room, and out of the game too if one is
    /// already running without them.
    async fn leave(&self, context: &Context) {
        let active = context
            .rooms
            .room(&self.room_id)
            .map(|room| room.data().active)
            .unwrap_or(false);

        if active {
            let _ = context
                .games
                .remove_player_by_id(&self.room_id, &self.user)
                .await;
        }

        context.rooms.remove_member(&self.room_id, &self.user);
    }

    async fn leave_room(&self, context: &Context, peer: SocketAddr) -> ServerResult<Reply> {
        let status = match context.rooms.room(&self.room_id) {
            Ok(_) => {
                self.leave(context).await;

                info!(
                    "Member '{}' left room '{}' ({})",
                    self.user.username, self.room_id, peer
                );

                true
            }
            Err(_) => {
                info!(
                    "Room '{}' was closed, member '{}' returns to the menu ({})",
                    self.room_id, self.user.username, peer
                );

                false
            }
        };

        Reply::with_next(
            ResponseKind::LeaveRoom,
            &LeaveRoomResponse { status },
            Handler::Menu(Menu::new(self.user.clone())),
        )
    }

    async fn room_state(&self, context: &Context, peer: SocketAddr) -> ServerResult<Reply> {
        let Ok(room) = context.rooms.room(&self.room_id) else {
            // The admin closed the room while we were waiting in it
            info!(
                "Room '{}' was closed, member '{}' returns to the menu ({})",
                self.room_id, self.user.username, peer
            );

            return Reply::with_next(
                ResponseKind::RoomState,
                &RoomStateResponse {
                    status: true,
                    has_game_begun: false,
                    players: Vec::new(),
                    question_count: 0,
                    answer_timeout: 0,
                    max_players: 0,
                    is_closed: true,
                },
                Handler::Menu(Menu::new(self.user.clone())),
            );
        };

        let data = room.data();
        let players = player_summaries(context, &room.members()).await?;

        let response = RoomStateResponse {
            status: true,
            has_game_begun: data.active,
            players,
            question_count: data.question_count,
            answer_timeout: data.time_per_question,
            max_players: data.max_players,
            is_closed: false,
        };

        // The game has started, so this member moves into it
        if data.active && context.games.game(&self.room_id).is_ok() {
            info!(
                "Game '{}' has started, member '{}' is transferred into it ({})",
                self.room_id, self.user.username, peer
            );

            return Reply::with_next(
                ResponseKind::RoomState,
                &response,
                Handler::InGame(InGame::new(self.user.clone(), self.room_id.clone())),
            );
        }

        Reply::new(ResponseKind::RoomState, &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServerError;
    use crate::session::tests::{menu_session, parse_reply, request, test_context};
    use crate::session::Session;

    async fn admin_session(context: &Context) -> (Session, RoomId) {
        let mut session = menu_session(context, "olive").await;

        session
            .handle(request(
                RequestKind::CreateRoom,
                &serde_json::json!({
                    "room_name": "Quick quiz",
                    "max_players": 4,
                    "question_count": 3,
                    "time_per_question": 10,
                }),
            ))
            .await;

        let room_id = context.rooms.list()[0].id.clone();

        (session, room_id)
    }

    async fn member_session(context: &Context, room_id: &str) -> Session {
        let mut session = menu_session(context, "remy").await;

        session
            .handle(request(
                RequestKind::JoinRoom,
                &serde_json::json!({ "room_id": room_id }),
            ))
            .await;

        session
    }

    #[tokio::test]
    async fn starting_alone_is_refused() {
        let context = test_context().await;
        let (mut admin, _) = admin_session(&context).await;

        let reply = admin
            .handle(request(RequestKind::StartGame, &serde_json::json!({})))
            .await;

        assert_eq!(reply.kind, ResponseKind::Error);
        let response: serde_json::Value = parse_reply(&reply);
        assert_eq!(
            response["message"],
            ServerError::NotEnoughPlayers.to_string()
        );
        assert!(matches!(admin.handler(), Handler::RoomAdmin(_)));
    }

    #[tokio::test]
    async fn starting_a_game_moves_the_admin_into_it() {
        let context = test_context().await;
        let (mut admin, room_id) = admin_session(&context).await;
        member_session(&context, &room_id).await;

        let reply = admin
            .handle(request(RequestKind::StartGame, &serde_json::json!({})))
            .await;

        let response: serde_json::Value = parse_reply(&reply);
        assert_eq!(response["status"], true);
        assert!(matches!(admin.handler(), Handler::InGame(_)));

        // The room shows active only now that the game exists
        assert!(context.rooms.list()[0].active);
        assert!(context.games.game(&room_id).is_ok());
    }

    #[tokio::test]
    async fn members_follow_the_room_state_into_the_game() {
        let context = test_context().await;
        let (mut admin, room_id) = admin_session(&context).await;
        let mut member = member_session(&context, &room_id).await;

        // Before the game starts, the state poll just reports the lobby
        let reply = member
            .handle(request(RequestKind::RoomState, &serde_json::json!({})))
            .await;
        let response: serde_json::Value = parse_reply(&reply);
        assert_eq!(response["has_game_begun"], false);
        assert!(matches!(member.handler(), Handler::RoomMember(_)));

        admin
            .handle(request(RequestKind::StartGame, &serde_json::json!({})))
            .await;

        let reply = member
            .handle(request(RequestKind::RoomState, &serde_json::json!({})))
            .await;
        let response: serde_json::Value = parse_reply(&reply);
        assert_eq!(response["has_game_begun"], true);
        assert!(matches!(member.handler(), Handler::InGame(_)));
    }

    #[tokio::test]
    async fn members_learn_when_the_room_is_closed() {
        let context = test_context().await;
        let (mut admin, room_id) = admin_session(&context).await;
        let mut member = member_session(&context, &room_id).await;

        let reply = admin
            .handle(request(RequestKind::CloseRoom, &serde_json::json!({})))
            .await;
        let response: serde_json::Value = parse_reply(&reply);
        assert_eq!(response["status"], true);
        assert!(matches!(admin.handler(), Handler::Menu(_)));

        let reply = member
            .handle(request(RequestKind::RoomState, &serde_json::json!({})))
            .await;
        let response: serde_json::Value = parse_reply(&reply);
        assert_eq!(response["is_closed"], true);
        assert!(matches!(member.handler(), Handler::Menu(_)));
    }

    #[tokio::test]
    async fn a_leaving_member_frees_their_seat() {
        let context = test_context().await;
        let (_admin, room_id) = admin_session(&context).await;
        let mut member = member_session(&context, &room_id).await;

        let reply = member
            .handle(request(RequestKind::LeaveRoom, &serde_json::json!({})))
            .await;

        let response: serde_json::Value = parse_reply(&reply);
        assert_eq!(response["status"], true);
        assert!(matches!(member.handler(), Handler::Menu(_)));

        let room = context.rooms.room(&room_id).expect("room still exists");
        assert_eq!(room.member_count(), 1);
    }

    #[tokio::test]
    async fn an_admin_disconnect_closes_the_room() {
        let context = test_context().await;
        let (mut admin, room_id) = admin_session(&context).await;

        admin.handle(Request::disconnect()).await;

        assert!(matches!(
            context.rooms.room(&room_id),
            Err(ServerError::NotFound { .. })
        ));

        // The login slot is free again
        menu_session(&context, "olive").await;
    }
}
