//! Length-prefixed framing for the TCP protocol
//!
//! Every message travels as a 4-byte big-endian length followed by exactly
//! that many bytes of bincode. TCP hands us arbitrary slices of that stream,
//! so the reader buffers until a whole frame is available and never assumes
//! one `read` equals one message.

use bincode::{deserialize, serialize};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const HEADER_LEN: usize = 4;
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection lost")]
    ConnectionLost,
    #[error("frame of {len} bytes exceeds the {max} byte limit", max = MAX_FRAME_LEN)]
    TooLarge { len: usize },
    #[error("failed to decode frame: {0}")]
    Decode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serializes `message` and prepends its length.
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, FrameError> {
    let payload = serialize(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge { len: payload.len() });
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Attempts to pull one complete frame off the front of `buf`.
///
/// Returns `Ok(None)` while the header or payload is still incomplete, and
/// the decoded message together with the number of bytes it occupied once
/// the whole frame is present.
pub fn try_decode_frame<T: DeserializeOwned>(buf: &[u8]) -> Result<Option<(T, usize)>, FrameError> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&buf[..HEADER_LEN]);
    let len = u32::from_be_bytes(header) as usize;

    if len == 0 {
        return Err(FrameError::ConnectionLost);
    }
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge { len });
    }
    if buf.len() < HEADER_LEN + len {
        return Ok(None);
    }

    let message = deserialize(&buf[HEADER_LEN..HEADER_LEN + len])?;
    Ok(Some((message, HEADER_LEN + len)))
}

/// Decodes a buffer that must hold one whole frame.
pub fn decode_frame<T: DeserializeOwned>(buf: &[u8]) -> Result<T, FrameError> {
    match try_decode_frame(buf)? {
        Some((message, _)) => Ok(message),
        None => Err(FrameError::ConnectionLost),
    }
}

pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Buffered frame reader.
///
/// Only plain `read` calls are awaited and received bytes are stored before
/// the next await point, so dropping a pending `read_frame` (for example
/// under `tokio::time::timeout`) never loses data.
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(4096),
        }
    }

    pub async fn read_frame<T: DeserializeOwned>(&mut self) -> Result<T, FrameError> {
        loop {
            if let Some((message, consumed)) = try_decode_frame(&self.buf)? {
                self.buf.drain(..consumed);
                return Ok(message);
            }

            let mut chunk = [0u8; 4096];
            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                return Err(FrameError::ConnectionLost);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ClientMessage, PlayerColor, PlayerSnapshot, ServerMessage, TileInfo, TileKind, TileUpdate,
    };

    #[test]
    fn test_header_is_big_endian_length() {
        let frame = encode_frame(&ClientMessage::Ready).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - HEADER_LEN);
    }

    #[test]
    fn test_state_frame_keeps_all_fields() {
        let message = ServerMessage::State {
            players: vec![PlayerSnapshot {
                x: 12.5,
                y: 80.0,
                color: PlayerColor::Pink,
                in_air: true,
            }],
            tiles: Some(vec![TileUpdate {
                x: 48.0,
                y: 96.0,
                color: Some(PlayerColor::Pink),
            }]),
        };

        let frame = encode_frame(&message).unwrap();
        let decoded: ServerMessage = decode_frame(&frame).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_every_message_survives_a_frame() {
        let snapshot = PlayerSnapshot {
            x: 32.0,
            y: 64.0,
            color: PlayerColor::Green,
            in_air: false,
        };
        let tiles = vec![
            TileInfo {
                x: 0.0,
                y: 48.0,
                kind: TileKind::Ground,
            },
            TileInfo {
                x: 16.0,
                y: 48.0,
                kind: TileKind::Platform,
            },
            TileInfo {
                x: 32.0,
                y: 32.0,
                kind: TileKind::Goal,
            },
        ];

        let server_messages = vec![
            ServerMessage::Initial {
                players: vec![snapshot.clone()],
                tile_map: tiles.clone(),
                your_player: PlayerColor::Green,
            },
            ServerMessage::State {
                players: vec![snapshot.clone()],
                tiles: None,
            },
            ServerMessage::State {
                players: Vec::new(),
                tiles: Some(vec![TileUpdate {
                    x: 16.0,
                    y: 48.0,
                    color: None,
                }]),
            },
            ServerMessage::NewGame {
                players: vec![snapshot],
                tile_map: tiles,
            },
            ServerMessage::Countdown { value: 0 },
            ServerMessage::Winner {
                color: PlayerColor::Purple,
            },
            ServerMessage::GameOver,
            ServerMessage::ShuttingDown,
            ServerMessage::Disconnected,
            ServerMessage::no_colors_available(),
        ];
        for message in server_messages {
            let frame = encode_frame(&message).unwrap();
            let decoded: ServerMessage = decode_frame(&frame).unwrap();
            assert_eq!(decoded, message);
        }

        let client_messages = vec![
            ClientMessage::Move {
                direction: "left".to_string(),
            },
            ClientMessage::Jump {
                drag_x: 12.0,
                drag_y: -80.0,
            },
            ClientMessage::Ready,
            ClientMessage::Disconnect,
        ];
        for message in client_messages {
            let frame = encode_frame(&message).unwrap();
            let decoded: ClientMessage = decode_frame(&frame).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn test_incomplete_frames_wait_for_more_bytes() {
        let frame = encode_frame(&ClientMessage::Jump {
            drag_x: -30.0,
            drag_y: -45.0,
        })
        .unwrap();

        for cut in 0..frame.len() {
            let partial: Option<(ClientMessage, usize)> = try_decode_frame(&frame[..cut]).unwrap();
            assert!(partial.is_none(), "decoded early at {} bytes", cut);
        }

        let (message, used) = try_decode_frame::<ClientMessage>(&frame).unwrap().unwrap();
        assert_eq!(used, frame.len());
        assert_eq!(
            message,
            ClientMessage::Jump {
                drag_x: -30.0,
                drag_y: -45.0
            }
        );
    }

    #[test]
    fn test_zero_length_payload_is_connection_lost() {
        let result: Result<ClientMessage, _> = decode_frame(&[0, 0, 0, 0]);
        assert!(matches!(result, Err(FrameError::ConnectionLost)));
    }

    #[test]
    fn test_truncated_header_is_connection_lost() {
        let result: Result<ClientMessage, _> = decode_frame(&[0, 0]);
        assert!(matches!(result, Err(FrameError::ConnectionLost)));
    }

    #[test]
    fn test_oversized_header_is_rejected() {
        let header = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();
        let result: Result<Option<(ClientMessage, usize)>, _> = try_decode_frame(&header);
        assert!(matches!(result, Err(FrameError::TooLarge { .. })));
    }

    #[test]
    fn test_garbage_payload_is_decode_error() {
        let frame = [0, 0, 0, 4, 0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<ClientMessage, _> = decode_frame(&frame);
        assert!(matches!(result, Err(FrameError::Decode(_))));
    }

    #[tokio::test]
    async fn test_reader_reassembles_split_frames() {
        let mut bytes = encode_frame(&ClientMessage::Move {
            direction: "left".to_string(),
        })
        .unwrap();
        bytes.extend(encode_frame(&ClientMessage::Disconnect).unwrap());

        let (mid_a, mid_b) = (3, bytes.len() - 2);
        let stream = tokio_test::io::Builder::new()
            .read(&bytes[..mid_a])
            .read(&bytes[mid_a..mid_b])
            .read(&bytes[mid_b..])
            .build();

        let mut reader = FrameReader::new(stream);
        let first: ClientMessage = reader.read_frame().await.unwrap();
        let second: ClientMessage = reader.read_frame().await.unwrap();
        assert_eq!(
            first,
            ClientMessage::Move {
                direction: "left".to_string()
            }
        );
        assert_eq!(second, ClientMessage::Disconnect);
    }

    #[tokio::test]
    async fn test_reader_reports_eof_inside_frame() {
        let bytes = encode_frame(&ClientMessage::Ready).unwrap();
        let stream = tokio_test::io::Builder::new()
            .read(&bytes[..bytes.len() - 1])
            .build();

        let mut reader = FrameReader::new(stream);
        let result: Result<ClientMessage, _> = reader.read_frame().await;
        assert!(matches!(result, Err(FrameError::ConnectionLost)));
    }

    #[tokio::test]
    async fn test_write_frame_emits_encoded_bytes() {
        let expected = encode_frame(&ServerMessage::Countdown { value: 2 }).unwrap();
        let mut sink = tokio_test::io::Builder::new().write(&expected).build();
        write_frame(&mut sink, &ServerMessage::Countdown { value: 2 })
            .await
            .unwrap();
    }
}
