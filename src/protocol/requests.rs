use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub address: String,
    pub phone_number: String,
    pub birthday: String,
}

#[derive(Debug, Deserialize)]
pub struct PlayersInRoomRequest {
    pub room_id: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub room_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub room_name: String,
    pub max_players: u32,
    pub question_count: u32,
    pub time_per_question: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub password: Option<String>,
    pub address: String,
    pub phone_number: String,
    pub avatar_color: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub answer_index: u32,
    pub question_index: u32,
}

#[derive(Debug, Deserialize)]
pub struct SubmitVerificationCodeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}
