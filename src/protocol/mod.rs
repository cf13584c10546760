mod codec;
mod requests;
mod responses;

pub use codec::*;
pub use requests::*;
pub use responses::*;

/// Every request a client can make, identified by the first byte of a frame.
///
/// [RequestKind::Disconnect] doubles as the internal disconnect signal: it is
/// synthesized by the connection manager when the transport fails, so every
/// handler treats it as "this client is gone, clean up".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestKind {
    Login = 1,
    Signup = 2,
    Logout = 3,
    ListRooms = 4,
    PlayersInRoom = 5,
    Highscores = 6,
    PersonalStats = 7,
    CreateRoom = 8,
    JoinRoom = 9,
    Profile = 10,
    UpdateProfile = 11,
    CloseRoom = 12,
    StartGame = 13,
    RoomState = 14,
    LeaveRoom = 15,
    LeaveGame = 16,
    GetQuestion = 17,
    SubmitAnswer = 18,
    GameResults = 19,
    SubmitVerificationCode = 20,
    ResendVerificationCode = 21,
    ForgotPassword = 22,
    Disconnect = 99,
}

impl RequestKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        let kind = match byte {
            1 => Self::Login,
            2 => Self::Signup,
            3 => Self::Logout,
            4 => Self::ListRooms,
            5 => Self::PlayersInRoom,
            6 => Self::Highscores,
            7 => Self::PersonalStats,
            8 => Self::CreateRoom,
            9 => Self::JoinRoom,
            10 => Self::Profile,
            11 => Self::UpdateProfile,
            12 => Self::CloseRoom,
            13 => Self::StartGame,
            14 => Self::RoomState,
            15 => Self::LeaveRoom,
            16 => Self::LeaveGame,
            17 => Self::GetQuestion,
            18 => Self::SubmitAnswer,
            19 => Self::GameResults,
            20 => Self::SubmitVerificationCode,
            21 => Self::ResendVerificationCode,
            22 => Self::ForgotPassword,
            99 => Self::Disconnect,
            _ => return None,
        };

        Some(kind)
    }
}

/// The first byte of a response frame. Mirrors [RequestKind], with 0 reserved
/// for error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseKind {
    Error = 0,
    Login = 1,
    Signup = 2,
    Logout = 3,
    ListRooms = 4,
    PlayersInRoom = 5,
    Highscores = 6,
    PersonalStats = 7,
    CreateRoom = 8,
    JoinRoom = 9,
    Profile = 10,
    UpdateProfile = 11,
    CloseRoom = 12,
    StartGame = 13,
    RoomState = 14,
    LeaveRoom = 15,
    LeaveGame = 16,
    GetQuestion = 17,
    SubmitAnswer = 18,
    GameResults = 19,
    SubmitVerificationCode = 20,
    ResendVerificationCode = 21,
    ForgotPassword = 22,
}

/// A single decoded request frame.
#[derive(Debug)]
pub struct Request {
    pub kind: RequestKind,
    pub payload: Vec<u8>,
}

impl Request {
    /// The internal disconnect signal. Never read off nor written to the wire
    /// by the server itself.
    pub fn disconnect() -> Self {
        Self {
            kind: RequestKind::Disconnect,
            payload: Vec::new(),
        }
    }
}
