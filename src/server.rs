use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use log::{error, info, warn};
use tokio::net::{tcp::OwnedReadHalf, TcpListener, TcpStream};

use crate::errors::{ServerError, ServerResult};
use crate::protocol::{read_request, write_response, Request, RequestKind};
use crate::session::Session;
use crate::util::{IdType, ID_COUNTER};
use crate::Context;

pub type ConnectionId = IdType;

/// Accepts TCP connections and runs one session per client, each on its own
/// task. Tracks the live connections for diagnostics and cleanup.
pub struct Acceptor {
    context: Context,
    connections: DashMap<ConnectionId, SocketAddr>,
}

impl Acceptor {
    pub fn new(context: Context) -> Arc<Self> {
        Arc::new(Self {
            context,
            connections: Default::default(),
        })
    }

    pub async fn run(self: Arc<Self>, address: &str) -> ServerResult<()> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;

        info!("Listening for client connections on {}", address);

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept client connection: {}", e);
                    continue;
                }
            };

            let id = ID_COUNTER.fetch_add(1);
            self.connections.insert(id, peer);

            info!(
                "Accepted client #{} from {} ({} connected)",
                id,
                peer,
                self.connection_count()
            );

            let acceptor = self.clone();
            tokio::spawn(async move {
                acceptor.handle_client(id, stream, peer).await;
            });
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// One connection's read/dispatch/write loop. Any transport failure turns
    /// into the disconnect signal, so the session always cleans up before the
    /// task exits.
    async fn handle_client(&self, id: ConnectionId, stream: TcpStream, peer: SocketAddr) {
        let (mut reader, mut writer) = stream.into_split();
        let mut session = Session::new(self.context.clone(), peer);

        loop {
            let request = Self::read_or_disconnect(&mut reader, peer).await;
            let is_disconnect = request.kind == RequestKind::Disconnect;

            let reply = session.handle(request).await;

            if is_disconnect {
                break;
            }

            if let Err(e) = write_response(&mut writer, reply.kind, &reply.payload).await {
                warn!("Failed to write to client #{} ({}): {}", id, peer, e);

                // The peer is gone, give the session its disconnect
                session.handle(Request::disconnect()).await;
                break;
            }
        }

        info!("Closing connection with client #{} ({})", id, peer);
        self.connections.remove(&id);
    }

    async fn read_or_disconnect(reader: &mut OwnedReadHalf, peer: SocketAddr) -> Request {
        match read_request(reader).await {
            Ok(request) => request,
            Err(ServerError::ClientDisconnected) => Request::disconnect(),
            Err(e) => {
                error!("Failed to read from client ({}): {}", peer, e);
                Request::disconnect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::protocol::ResponseKind;
    use crate::session::tests::test_context;

    async fn start_acceptor() -> (Arc<Acceptor>, SocketAddr) {
        let context = test_context().await;
        let acceptor = Acceptor::new(context);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener binds");
        let address = listener.local_addr().expect("address is known");
        drop(listener);

        let running = acceptor.clone();
        tokio::spawn(async move {
            running
                .run(&address.to_string())
                .await
                .expect("acceptor runs");
        });

        // Give the listener a moment to come up
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        (acceptor, address)
    }

    fn frame(kind: u8, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![kind];
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    #[tokio::test]
    async fn clients_get_framed_responses_over_tcp() {
        let (_acceptor, address) = start_acceptor().await;

        let mut client = TcpStream::connect(address).await.expect("client connects");

        let login = serde_json::json!({ "username": "olive", "password": "Sup3r$ecret" });
        client
            .write_all(&frame(1, login.to_string().as_bytes()))
            .await
            .expect("request is written");

        let mut header = [0u8; 5];
        client
            .read_exact(&mut header)
            .await
            .expect("response header arrives");

        assert_eq!(header[0], ResponseKind::Login as u8);

        let length = u32::from_be_bytes(header[1..5].try_into().expect("four bytes"));
        let mut payload = vec![0u8; length as usize];
        client
            .read_exact(&mut payload)
            .await
            .expect("response payload arrives");

        let response: serde_json::Value =
            serde_json::from_slice(&payload).expect("payload is json");
        assert_eq!(response["status"], true);
    }

    #[tokio::test]
    async fn dropping_the_socket_cleans_the_connection_up() {
        let (acceptor, address) = start_acceptor().await;

        let client = TcpStream::connect(address).await.expect("client connects");
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(acceptor.connection_count(), 1);

        drop(client);
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert_eq!(acceptor.connection_count(), 0);
    }
}
