//! Framed codec for the backend control channel.
//!
//! # Wire format
//! Each frame is a 4-byte big-endian length followed by a JSON document.
//! Messages are type-tagged objects, so field names and values survive the
//! round trip and either end can be reimplemented in another language.
//!
//! # Design Decisions
//! - Generic over the stream: real connections are `TcpStream`, tests use
//!   in-memory duplex pipes
//! - Clean EOF at a frame boundary is `Ok(None)`; EOF inside a frame is an
//!   error — the peer vanished mid-message
//! - Frames are capped well above any real message to bound memory

use std::io;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on an encoded frame. Control messages are tiny; anything
/// bigger is a confused or hostile peer.
const MAX_FRAME: u32 = 64 * 1024;

/// A control-channel message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Sent once by the backend after connecting. An empty `host` asks the
    /// frontend to infer it from the TCP peer address.
    Register {
        name: String,
        host: String,
        port: u16,
    },
    /// Liveness probe. The frontend sends a nonce; the backend echoes it.
    Status { nonce: i64 },
}

/// Length-framed message stream over any async byte stream.
pub struct Framed<S> {
    stream: S,
}

impl<S> Framed<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> Framed<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Encodes and writes one message.
    pub async fn send(&mut self, msg: &Message) -> io::Result<()> {
        let body = serde_json::to_vec(msg)?;
        let len = u32::try_from(body.len())
            .ok()
            .filter(|len| *len <= MAX_FRAME)
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, "frame too large to send")
            })?;
        self.stream.write_all(&len.to_be_bytes()).await?;
        self.stream.write_all(&body).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads one message. `Ok(None)` means the peer closed cleanly between
    /// frames.
    pub async fn recv(&mut self) -> io::Result<Option<Message>> {
        let mut len_buf = [0u8; 4];
        // The first byte decides between clean EOF and a truncated frame.
        let n = self.stream.read(&mut len_buf[..1]).await?;
        if n == 0 {
            return Ok(None);
        }
        self.stream.read_exact(&mut len_buf[1..]).await?;

        let len = u32::from_be_bytes(len_buf);
        if len > MAX_FRAME {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds the {MAX_FRAME} byte cap"),
            ));
        }

        let mut body = vec![0u8; len as usize];
        self.stream.read_exact(&mut body).await?;
        let msg = serde_json::from_slice(&body)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn messages_round_trip() {
        let (left, right) = duplex(4096);
        let mut sender = Framed::new(left);
        let mut receiver = Framed::new(right);

        let messages = [
            Message::Register {
                name: "test".to_string(),
                host: String::new(),
                port: 1337,
            },
            Message::Status { nonce: i64::MAX },
            Message::Status { nonce: 0 },
        ];
        for msg in &messages {
            sender.send(msg).await.unwrap();
            let decoded = receiver.recv().await.unwrap().expect("frame");
            assert_eq!(&decoded, msg);
        }
    }

    #[tokio::test]
    async fn field_names_survive_encoding() {
        // The encoding is self-describing: a reader that only knows JSON can
        // pick out every field by name.
        let (mut left, right) = duplex(4096);
        let mut sender = Framed::new(&mut left);
        sender
            .send(&Message::Register {
                name: "blog".to_string(),
                host: "10.0.0.5".to_string(),
                port: 8001,
            })
            .await
            .unwrap();
        drop(left);

        let mut buf = Vec::new();
        let mut right = right;
        right.read_to_end(&mut buf).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&buf[4..]).unwrap();
        assert_eq!(body["type"], "register");
        assert_eq!(body["name"], "blog");
        assert_eq!(body["host"], "10.0.0.5");
        assert_eq!(body["port"], 8001);
    }

    #[tokio::test]
    async fn clean_eof_is_none() {
        let (left, right) = duplex(64);
        drop(left);
        let mut receiver = Framed::new(right);
        assert!(receiver.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_frame_is_an_error() {
        let (mut left, right) = duplex(64);
        left.write_all(&[0, 0, 0, 10, b'{']).await.unwrap();
        drop(left);
        let mut receiver = Framed::new(right);
        let err = receiver.recv().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn garbage_body_is_invalid_data() {
        let (mut left, right) = duplex(64);
        left.write_all(&[0, 0, 0, 3]).await.unwrap();
        left.write_all(b"???").await.unwrap();
        drop(left);
        let mut receiver = Framed::new(right);
        let err = receiver.recv().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let (mut left, right) = duplex(64);
        left.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        drop(left);
        let mut receiver = Framed::new(right);
        let err = receiver.recv().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
