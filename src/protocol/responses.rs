use std::collections::BTreeMap;

use serde::Serialize;

use crate::rooms::RoomData;
use crate::store::{PlayerSummary, UserProfile, UserStatistics};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub status: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub status: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub status: bool,
}

/// One entry in the room list: the room's settings, whether its game already
/// ran to completion, and who is currently inside.
#[derive(Debug, Serialize)]
pub struct RoomListing {
    pub room: RoomData,
    pub is_finished: bool,
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Serialize)]
pub struct ListRoomsResponse {
    pub status: bool,
    pub rooms: Vec<RoomListing>,
}

#[derive(Debug, Serialize)]
pub struct PlayersInRoomResponse {
    pub status: bool,
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Serialize)]
pub struct HighscoresResponse {
    pub status: bool,
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Serialize)]
pub struct PersonalStatsResponse {
    pub status: bool,
    pub statistics: UserStatistics,
}

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub status: bool,
}

#[derive(Debug, Serialize)]
pub struct JoinRoomResponse {
    pub status: bool,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub status: bool,
    pub profile: UserProfile,
    pub statistics: UserStatistics,
}

#[derive(Debug, Serialize)]
pub struct UpdateProfileResponse {
    pub status: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CloseRoomResponse {
    pub status: bool,
}

#[derive(Debug, Serialize)]
pub struct StartGameResponse {
    pub status: bool,
}

#[derive(Debug, Serialize)]
pub struct RoomStateResponse {
    pub status: bool,
    pub has_game_begun: bool,
    pub players: Vec<PlayerSummary>,
    pub question_count: u32,
    pub answer_timeout: u32,
    pub max_players: u32,
    pub is_closed: bool,
}

#[derive(Debug, Serialize)]
pub struct LeaveRoomResponse {
    pub status: bool,
}

#[derive(Debug, Serialize)]
pub struct LeaveGameResponse {
    pub status: bool,
}

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub status: bool,
    pub question_index: u32,
    pub question: String,
    pub answers: BTreeMap<u32, String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitAnswerResponse {
    pub status: bool,
    pub correct_answer_index: u32,
}

/// One player's final standing, shown to everyone once the game is over.
#[derive(Debug, Serialize)]
pub struct PlayerResult {
    pub username: String,
    pub avatar_color: String,
    pub is_online: bool,
    pub score_change: i64,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    pub average_answer_time: u32,
}

/// A question as the requesting player answered it.
#[derive(Debug, Serialize)]
pub struct AnswerReview {
    pub question: String,
    pub answers: BTreeMap<u32, String>,
    pub chosen_index: u32,
    pub correct_index: u32,
    pub answer_time: u32,
}

#[derive(Debug, Serialize)]
pub struct GameResultsResponse {
    pub status: bool,
    pub answers: Vec<AnswerReview>,
    pub players: Vec<PlayerResult>,
}

#[derive(Debug, Serialize)]
pub struct SubmitVerificationCodeResponse {
    pub status: bool,
    pub is_verified: bool,
}

#[derive(Debug, Serialize)]
pub struct ResendVerificationCodeResponse {
    pub status: bool,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordResponse {
    pub status: bool,
}
