use std::net::SocketAddr;

use log::{info, warn};

use super::{player_summaries, Handler, Reply, RoomAdmin, RoomMember, Unauthenticated};
use crate::auth::Identity;
use crate::errors::{ServerError, ServerResult};
use crate::protocol::{
    parse_payload, CreateRoomRequest, CreateRoomResponse, HighscoresResponse, JoinRoomRequest,
    JoinRoomResponse, ListRoomsResponse, LogoutResponse, PersonalStatsResponse,
    PlayersInRoomRequest, PlayersInRoomResponse, ProfileResponse, Request, RequestKind,
    ResponseKind, RoomListing, UpdateProfileRequest, UpdateProfileResponse,
};
use crate::rooms::NewRoom;
use crate::store::ProfileUpdate;
use crate::validate;
use crate::Context;

const NUM_OF_TOP_PLAYERS: u32 = 50;

/// A logged-in user browsing around, not yet in any room.
pub struct Menu {
    user: Identity,
}

impl Menu {
    pub fn new(user: Identity) -> Self {
        Self { user }
    }

    pub async fn handle(
        &mut self,
        context: &Context,
        request: &Request,
        peer: SocketAddr,
    ) -> ServerResult<Reply> {
        match request.kind {
            RequestKind::Logout => self.logout(context, peer),
            RequestKind::ListRooms => self.list_rooms(context).await,
            RequestKind::PlayersInRoom => self.players_in_room(context, &request.payload).await,
            RequestKind::Highscores => self.highscores(context).await,
            RequestKind::PersonalStats => self.personal_stats(context).await,
            RequestKind::JoinRoom => self.join_room(context, &request.payload, peer).await,
            RequestKind::CreateRoom => self.create_room(context, &request.payload, peer).await,
            RequestKind::Profile => self.profile(context).await,
            RequestKind::UpdateProfile => self.update_profile(context, &request.payload).await,
            RequestKind::Disconnect => {
                context.auth.logout(&self.user.username);
                Ok(Reply::empty())
            }
            _ => Err(ServerError::Unauthorized),
        }
    }

    fn logout(&self, context: &Context, peer: SocketAddr) -> ServerResult<Reply> {
        context.auth.logout(&self.user.username);
        info!("User '{}' logged out ({})", self.user.username, peer);

        Reply::with_next(
            ResponseKind::Logout,
            &LogoutResponse { status: true },
            Handler::Unauthenticated(Unauthenticated),
        )
    }

    async fn list_rooms(&self, context: &Context) -> ServerResult<Reply> {
        let mut rooms = Vec::new();

        for data in context.rooms.list() {
            let Ok(room) = context.rooms.room(&data.id) else {
                // Deleted between the snapshot and now
                continue;
            };

            let players = match player_summaries(context, &room.members()).await {
                Ok(players) => players,
                Err(e) => {
                    warn!("Failed to resolve players of room '{}': {}", data.name, e);
                    continue;
                }
            };

            // A room whose game is gone or over is joinable again
            let is_finished = data.active
                && context
                    .games
                    .game(&data.id)
                    .map(|game| game.is_finished())
                    .unwrap_or(true);

            rooms.push(RoomListing {
                room: data,
                is_finished,
                players,
            });
        }

        Reply::new(
            ResponseKind::ListRooms,
            &ListRoomsResponse {
                status: true,
                rooms,
            },
        )
    }

    async fn players_in_room(&self, context: &Context, payload: &[u8]) -> ServerResult<Reply> {
        let request: PlayersInRoomRequest = parse_payload(payload)?;

        let players = match context.rooms.room(&request.room_id) {
            Ok(room) => player_summaries(context, &room.members()).await.ok(),
            Err(_) => None,
        };

        let response = match players {
            Some(players) => PlayersInRoomResponse {
                status: true,
                players,
            },
            None => PlayersInRoomResponse {
                status: false,
                players: Vec::new(),
            },
        };

        Reply::new(ResponseKind::PlayersInRoom, &response)
    }

    async fn highscores(&self, context: &Context) -> ServerResult<Reply> {
        let players = context.storage.top_players(NUM_OF_TOP_PLAYERS).await?;

        Reply::new(
            ResponseKind::Highscores,
            &HighscoresResponse {
                status: true,
                players,
            },
        )
    }

    async fn personal_stats(&self, context: &Context) -> ServerResult<Reply> {
        let statistics = context.storage.user_statistics(&self.user.username).await?;

        Reply::new(
            ResponseKind::PersonalStats,
            &PersonalStatsResponse {
                status: true,
                statistics,
            },
        )
    }

    async fn join_room(
        &self,
        context: &Context,
        payload: &[u8],
        peer: SocketAddr,
    ) -> ServerResult<Reply> {
        let request: JoinRoomRequest = parse_payload(payload)?;

        let room = context.rooms.room(&request.room_id)?;

        if let Err(e) = room.add_member(self.user.clone()) {
            warn!(
                "User '{}' failed to join room '{}' ({}) ({})",
                self.user.username, request.room_id, e, peer
            );

            return Reply::new(ResponseKind::JoinRoom, &JoinRoomResponse { status: false });
        }

        info!(
            "User '{}' joined room '{}' ({})",
            self.user.username, request.room_id, peer
        );

        Reply::with_next(
            ResponseKind::JoinRoom,
            &JoinRoomResponse { status: true },
            Handler::RoomMember(RoomMember::new(self.user.clone(), room.id())),
        )
    }

    async fn create_room(
        &self,
        context: &Context,
        payload: &[u8],
        peer: SocketAddr,
    ) -> ServerResult<Reply> {
        let request: CreateRoomRequest = parse_payload(payload)?;

        if !is_valid_room(&request) {
            warn!(
                "User '{}' failed to create room (invalid room details) ({})",
                self.user.username, peer
            );

            return Reply::new(
                ResponseKind::CreateRoom,
                &CreateRoomResponse { status: false },
            );
        }

        let room = context.rooms.create(
            self.user.clone(),
            NewRoom {
                name: request.room_name.clone(),
                max_players: request.max_players,
                question_count: request.question_count,
                time_per_question: request.time_per_question,
            },
        );

        info!(
            "User '{}' created room '{}' ({})",
            self.user.username, request.room_name, peer
        );

        Reply::with_next(
            ResponseKind::CreateRoom,
            &CreateRoomResponse { status: true },
            Handler::RoomAdmin(RoomAdmin::new(self.user.clone(), room.id())),
        )
    }

    async fn profile(&self, context: &Context) -> ServerResult<Reply> {
        let profile = context.storage.user_profile(&self.user.username).await?;
        let statistics = context.storage.user_statistics(&self.user.username).await?;

        Reply::new(
            ResponseKind::Profile,
            &ProfileResponse {
                status: true,
                profile,
                statistics,
            },
        )
    }

    async fn update_profile(&self, context: &Context, payload: &[u8]) -> ServerResult<Reply> {
        let request: UpdateProfileRequest = parse_payload(payload)?;

        if let Err(message) = validate_profile(&request) {
            return Reply::new(
                ResponseKind::UpdateProfile,
                &UpdateProfileResponse {
                    status: false,
                    message,
                },
            );
        }

        context
            .storage
            .update_user_profile(
                &self.user.username,
                ProfileUpdate {
                    password: request.password,
                    address: request.address,
                    phone_number: request.phone_number,
                    avatar_color: request.avatar_color,
                },
            )
            .await?;

        info!("User '{}' updated their profile", self.user.username);

        Reply::new(
            ResponseKind::UpdateProfile,
            &UpdateProfileResponse {
                status: true,
                message: String::new(),
            },
        )
    }
}

fn is_valid_room(request: &CreateRoomRequest) -> bool {
    request.room_name.len() >= 4
        && request.max_players > 1
        && request.question_count >= 2
        && request.time_per_question >= 5
}

fn validate_profile(request: &UpdateProfileRequest) -> Result<(), String> {
    if let Some(password) = &request.password {
        validate::password(password)?;
    }

    validate::address(&request.address)?;
    validate::phone_number(&request.phone_number)?;
    validate::avatar_color(&request.avatar_color)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{menu_session, parse_reply, request, test_context};

    fn room_payload() -> serde_json::Value {
        serde_json::json!({
            "room_name": "Quick quiz",
            "max_players": 4,
            "question_count": 3,
            "time_per_question": 10,
        })
    }

    #[tokio::test]
    async fn creating_a_room_promotes_to_admin() {
        let context = test_context().await;
        let mut session = menu_session(&context, "olive").await;

        let reply = session
            .handle(request(RequestKind::CreateRoom, &room_payload()))
            .await;

        let response: serde_json::Value = parse_reply(&reply);
        assert_eq!(response["status"], true);
        assert!(matches!(session.handler(), Handler::RoomAdmin(_)));
        assert_eq!(context.rooms.list().len(), 1);
    }

    #[tokio::test]
    async fn invalid_room_parameters_register_nothing() {
        let context = test_context().await;
        let mut session = menu_session(&context, "olive").await;

        let invalid = [
            serde_json::json!({ "room_name": "abc", "max_players": 4, "question_count": 3, "time_per_question": 10 }),
            serde_json::json!({ "room_name": "Quick quiz", "max_players": 1, "question_count": 3, "time_per_question": 10 }),
            serde_json::json!({ "room_name": "Quick quiz", "max_players": 4, "question_count": 1, "time_per_question": 10 }),
            serde_json::json!({ "room_name": "Quick quiz", "max_players": 4, "question_count": 3, "time_per_question": 4 }),
        ];

        for payload in invalid {
            let reply = session.handle(request(RequestKind::CreateRoom, &payload)).await;
            let response: serde_json::Value = parse_reply(&reply);

            assert_eq!(response["status"], false);
            assert!(matches!(session.handler(), Handler::Menu(_)));
        }

        assert!(context.rooms.list().is_empty());
    }

    #[tokio::test]
    async fn joining_a_room_promotes_to_member() {
        let context = test_context().await;
        let mut admin = menu_session(&context, "olive").await;
        admin
            .handle(request(RequestKind::CreateRoom, &room_payload()))
            .await;

        let room_id = context.rooms.list()[0].id.clone();

        let mut member = menu_session(&context, "remy").await;
        let reply = member
            .handle(request(
                RequestKind::JoinRoom,
                &serde_json::json!({ "room_id": room_id }),
            ))
            .await;

        let response: serde_json::Value = parse_reply(&reply);
        assert_eq!(response["status"], true);
        assert!(matches!(member.handler(), Handler::RoomMember(_)));
    }

    #[tokio::test]
    async fn joining_a_missing_room_is_an_error() {
        let context = test_context().await;
        let mut session = menu_session(&context, "olive").await;

        let reply = session
            .handle(request(
                RequestKind::JoinRoom,
                &serde_json::json!({ "room_id": "nope" }),
            ))
            .await;

        assert_eq!(reply.kind, ResponseKind::Error);
        assert!(matches!(session.handler(), Handler::Menu(_)));
    }

    #[tokio::test]
    async fn the_room_list_names_its_players() {
        let context = test_context().await;
        let mut session = menu_session(&context, "olive").await;
        session
            .handle(request(RequestKind::CreateRoom, &room_payload()))
            .await;

        let mut browser = menu_session(&context, "remy").await;
        let reply = browser
            .handle(request(RequestKind::ListRooms, &serde_json::json!({})))
            .await;

        let response: serde_json::Value = parse_reply(&reply);
        assert_eq!(response["rooms"].as_array().expect("rooms is a list").len(), 1);
        assert_eq!(response["rooms"][0]["players"][0]["username"], "olive");
        assert_eq!(response["rooms"][0]["is_finished"], false);
    }

    #[tokio::test]
    async fn personal_stats_come_back_for_the_logged_in_user() {
        let context = test_context().await;
        let mut session = menu_session(&context, "olive").await;

        let reply = session
            .handle(request(RequestKind::PersonalStats, &serde_json::json!({})))
            .await;

        let response: serde_json::Value = parse_reply(&reply);
        assert_eq!(response["status"], true);
        assert_eq!(response["statistics"]["total_games"], 0);
    }

    #[tokio::test]
    async fn profile_updates_validate_their_fields() {
        let context = test_context().await;
        let mut session = menu_session(&context, "olive").await;

        let reply = session
            .handle(request(
                RequestKind::UpdateProfile,
                &serde_json::json!({
                    "password": null,
                    "address": "Elm Street, 13, Shelbyville",
                    "phone_number": "052-7654321",
                    "avatar_color": "Chartreuse",
                }),
            ))
            .await;

        let response: serde_json::Value = parse_reply(&reply);
        assert_eq!(response["status"], false);

        let reply = session
            .handle(request(
                RequestKind::UpdateProfile,
                &serde_json::json!({
                    "password": null,
                    "address": "Elm Street, 13, Shelbyville",
                    "phone_number": "052-7654321",
                    "avatar_color": "Pink",
                }),
            ))
            .await;

        let response: serde_json::Value = parse_reply(&reply);
        assert_eq!(response["status"], true);

        let profile: serde_json::Value = parse_reply(
            &session
                .handle(request(RequestKind::Profile, &serde_json::json!({})))
                .await,
        );
        assert_eq!(profile["profile"]["avatar_color"], "Pink");
    }
}
