use serde::Serialize;

pub const AVATAR_COLORS: [&str; 8] = [
    "Blue", "Green", "Red", "Purple", "Orange", "Cyan", "Yellow", "Pink",
];

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub address: String,
    pub phone_number: String,
    pub birthday: String,
    pub avatar_color: String,
}

/// A user as shown to themselves.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub address: String,
    pub phone_number: String,
    pub birthday: String,
    pub avatar_color: String,
    pub member_since: i64,
}

#[derive(Debug)]
pub struct ProfileUpdate {
    pub password: Option<String>,
    pub address: String,
    pub phone_number: String,
    pub avatar_color: String,
}

/// A user as shown to other players.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSummary {
    pub username: String,
    pub avatar_color: String,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStatistics {
    pub average_answer_time: Option<u32>,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    pub total_answers: u32,
    pub total_games: u32,
    pub score: u32,
}

/// A question as it sits in the bank, before its answers are shuffled.
#[derive(Debug, Clone)]
pub struct QuestionRow {
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: [String; 3],
}

/// One player's tally from a finished (or abandoned) game, ready to fold into
/// their persisted statistics.
#[derive(Debug, Clone, Copy)]
pub struct GameOutcome {
    pub correct_answers: u32,
    pub wrong_answers: u32,
    pub average_answer_time: u32,
    pub score_change: i64,
}
