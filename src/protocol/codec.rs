use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{Request, RequestKind, ResponseKind};
use crate::errors::{ServerError, ServerResult};

/// Upper bound on a frame's payload, guarding against hostile length headers.
pub const MAX_PAYLOAD_LEN: u32 = 64 * 1024;

/// Reads one framed request: a kind byte, a big-endian length, then that many
/// payload bytes.
pub async fn read_request<R>(reader: &mut R) -> ServerResult<Request>
where
    R: AsyncRead + Unpin,
{
    let mut kind = [0u8; 1];
    reader
        .read_exact(&mut kind)
        .await
        .map_err(ServerError::from_io)?;

    let kind = RequestKind::from_byte(kind[0])
        .ok_or_else(|| ServerError::InvalidRequest("Invalid request kind".to_string()))?;

    let mut length = [0u8; 4];
    reader
        .read_exact(&mut length)
        .await
        .map_err(ServerError::from_io)?;

    let length = u32::from_be_bytes(length);

    if length > MAX_PAYLOAD_LEN {
        return Err(ServerError::InvalidRequest(
            "Request payload too large".to_string(),
        ));
    }

    let mut payload = vec![0u8; length as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(ServerError::from_io)?;

    Ok(Request { kind, payload })
}

/// Writes one framed response, mirroring the request framing.
pub async fn write_response<W>(
    writer: &mut W,
    kind: ResponseKind,
    payload: &[u8],
) -> ServerResult<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = Vec::with_capacity(payload.len() + 5);

    frame.push(kind as u8);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);

    writer
        .write_all(&frame)
        .await
        .map_err(ServerError::from_io)?;

    Ok(())
}

/// Deserializes a request payload, mapping failures into the error taxonomy.
pub fn parse_payload<T>(payload: &[u8]) -> ServerResult<T>
where
    T: DeserializeOwned,
{
    serde_json::from_slice(payload).map_err(|e| ServerError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn requests_round_trip_through_the_framing() {
        let payload = br#"{"username":"olive","password":"hunter2"}"#;

        let mut frame = vec![RequestKind::Login as u8];
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(payload);

        let request = read_request(&mut frame.as_slice())
            .await
            .expect("request is decoded");

        assert_eq!(request.kind, RequestKind::Login);
        assert_eq!(request.payload, payload);
    }

    #[tokio::test]
    async fn responses_are_framed_with_big_endian_lengths() {
        let mut written = Vec::new();
        write_response(&mut written, ResponseKind::Login, b"{}")
            .await
            .expect("response is written");

        assert_eq!(written[0], 1);
        assert_eq!(&written[1..5], &[0, 0, 0, 2]);
        assert_eq!(&written[5..], b"{}");
    }

    #[tokio::test]
    async fn unknown_request_kinds_are_rejected() {
        let frame = [42u8, 0, 0, 0, 0];
        let result = read_request(&mut frame.as_slice()).await;

        assert!(matches!(result, Err(ServerError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn oversized_payload_lengths_are_rejected() {
        let mut frame = vec![RequestKind::Login as u8];
        frame.extend_from_slice(&(MAX_PAYLOAD_LEN + 1).to_be_bytes());

        let result = read_request(&mut frame.as_slice()).await;

        assert!(matches!(result, Err(ServerError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn truncated_frames_read_as_disconnection() {
        let frame = [RequestKind::Login as u8, 0, 0];
        let result = read_request(&mut frame.as_slice()).await;

        assert!(matches!(result, Err(ServerError::ClientDisconnected)));
    }
}
