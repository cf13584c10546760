use std::io;

use thiserror::Error;

use crate::store::StorageError;

/// Result alias used across the server for fallible operations that surface
/// the shared [`ServerError`] taxonomy.
pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// The full failure taxonomy for the server.
///
/// Storage and transport failures are internal: they get logged with the
/// connection's peer address and surfaced to the client as a generic failure.
/// Validation and business errors carry a specific, client-visible message.
/// None of these variants kill the connection task except an explicit
/// [`ServerError::ClientDisconnected`].
#[derive(Debug, Error)]
pub enum ServerError {
    /// A failure bubbling up from the storage backend.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The request was malformed or otherwise could not be honored.
    #[error("{0}")]
    InvalidRequest(String),

    /// A transport-level failure while talking to the client socket.
    #[error("transport error: {0}")]
    Transport(String),

    /// The client hung up; the connection task should wind down cleanly.
    #[error("client disconnected")]
    ClientDisconnected,

    /// Authentication failed with a client-visible reason.
    #[error("{0}")]
    InvalidCredentials(String),

    /// A payload could not be deserialized.
    #[error("could not deserialize payload: {0}")]
    Deserialization(String),

    /// A requested resource does not exist.
    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    /// A resource that must be unique already exists.
    #[error("{0}")]
    AlreadyExists(String),

    /// The caller is not permitted to perform this action.
    #[error("not authorized")]
    Unauthorized,

    /// The requested operation is not implemented.
    #[error("not implemented")]
    Unimplemented,

    /// An external service (e.g. the question fetcher or mailer) failed.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// The room is already at capacity.
    #[error("room is full")]
    RoomFull,

    /// A game cannot start without enough players.
    #[error("not enough players to start")]
    NotEnoughPlayers,
}

impl ServerError {
    /// Maps an I/O error from a client socket into the taxonomy: an end of
    /// stream or a reset/broken pipe reads as a disconnection, anything else
    /// is a transport failure.
    pub fn from_io(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => ServerError::ClientDisconnected,
            _ => ServerError::Transport(error.to_string()),
        }
    }
}
