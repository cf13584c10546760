use std::net::SocketAddr;

use log::error;
use serde::Serialize;

mod game;
mod login;
mod menu;
mod room;
mod verification;

pub use game::*;
pub use login::*;
pub use menu::*;
pub use room::*;
pub use verification::*;

use crate::auth::Identity;
use crate::errors::{ServerError, ServerResult};
use crate::protocol::{ErrorResponse, Request, ResponseKind};
use crate::store::PlayerSummary;
use crate::Context;

/// The behavior bound to one phase of a connection's lifetime. Each variant
/// accepts its own subset of requests and decides what phase comes next.
pub enum Handler {
    Unauthenticated(Unauthenticated),
    AwaitingVerification(AwaitingVerification),
    Menu(Menu),
    RoomAdmin(RoomAdmin),
    RoomMember(RoomMember),
    InGame(InGame),
}

/// What a handler gives back: a response frame, and optionally the handler
/// to install for the requests that follow.
pub struct Reply {
    pub kind: ResponseKind,
    pub payload: Vec<u8>,
    next: Option<Handler>,
}

impl Reply {
    pub fn new<T: Serialize>(kind: ResponseKind, response: &T) -> ServerResult<Self> {
        let payload = serde_json::to_vec(response)
            .map_err(|e| ServerError::Deserialization(e.to_string()))?;

        Ok(Self {
            kind,
            payload,
            next: None,
        })
    }

    pub fn with_next<T: Serialize>(
        kind: ResponseKind,
        response: &T,
        next: Handler,
    ) -> ServerResult<Self> {
        let mut reply = Self::new(kind, response)?;
        reply.next = Some(next);

        Ok(reply)
    }

    /// A reply that is never written, for the disconnect signal.
    pub fn empty() -> Self {
        Self {
            kind: ResponseKind::Error,
            payload: Vec::new(),
            next: None,
        }
    }

    pub fn error(error: &ServerError) -> Self {
        let payload = serde_json::to_vec(&ErrorResponse {
            message: error.to_string(),
        })
        .expect("error response serializes");

        Self {
            kind: ResponseKind::Error,
            payload,
            next: None,
        }
    }
}

/// Per-connection state: the current handler, and everything it needs to do
/// its job. Dispatches each request and swaps the handler on transitions.
pub struct Session {
    context: Context,
    peer: SocketAddr,
    handler: Handler,
}

impl Session {
    pub fn new(context: Context, peer: SocketAddr) -> Self {
        Self {
            context,
            peer,
            handler: Handler::Unauthenticated(Unauthenticated),
        }
    }

    pub async fn handle(&mut self, request: Request) -> Reply {
        let result = match &mut self.handler {
            Handler::Unauthenticated(h) => h.handle(&self.context, &request, self.peer).await,
            Handler::AwaitingVerification(h) => h.handle(&self.context, &request, self.peer).await,
            Handler::Menu(h) => h.handle(&self.context, &request, self.peer).await,
            Handler::RoomAdmin(h) => h.handle(&self.context, &request, self.peer).await,
            Handler::RoomMember(h) => h.handle(&self.context, &request, self.peer).await,
            Handler::InGame(h) => h.handle(&self.context, &request, self.peer).await,
        };

        let mut reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                error!("{} ({})", e, self.peer);
                Reply::error(&e)
            }
        };

        if let Some(next) = reply.next.take() {
            self.handler = next;
        }

        reply
    }

    #[cfg(test)]
    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }

    #[cfg(test)]
    pub(crate) fn set_handler(&mut self, handler: Handler) {
        self.handler = handler;
    }
}

/// Resolves a set of identities into the summaries shown to other players.
pub(crate) async fn player_summaries(
    context: &Context,
    users: &[Identity],
) -> ServerResult<Vec<PlayerSummary>> {
    let mut players = Vec::with_capacity(users.len());

    for user in users {
        players.push(context.storage.player_by_username(&user.username).await?);
    }

    Ok(players)
}
