//! 帧编解码
//!
//! 每帧由 1 字节协议版本、4 字节大端长度和 JSON 消息体组成：
//! ```text
//! ┌────────────┬────────────────┬────────────────────────────────┐
//! │ Version(1B)│  Length (4B)   │         Payload (JSON)         │
//! │    u8      │    u32 BE      │      Request / Envelope        │
//! └────────────┴────────────────┴────────────────────────────────┘
//! ```
//! 版本不符或超长的帧是协议错误；读到 EOF 统一映射为连接已关闭。

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{RealtimeError, Result};
use crate::{MAX_FRAME_SIZE, PROTOCOL_VERSION};

/// 帧头大小: 1 字节版本 + 4 字节长度
const HEADER_SIZE: usize = 5;

/// 对端正常关闭时 read_exact 报 UnexpectedEof
fn map_read_err(e: std::io::Error) -> RealtimeError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        RealtimeError::ConnectionClosed
    } else {
        RealtimeError::Io(e)
    }
}

/// 帧读取器
pub struct FrameReader<R> {
    reader: R,
    /// 消息体缓冲，跨帧复用
    body_buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            body_buf: Vec::new(),
        }
    }

    /// 读取并解码一帧消息
    pub async fn read_frame<M: DeserializeOwned>(&mut self) -> Result<M> {
        let mut header = [0u8; HEADER_SIZE];
        self.reader
            .read_exact(&mut header)
            .await
            .map_err(map_read_err)?;

        let version = header[0];
        if version != PROTOCOL_VERSION {
            return Err(RealtimeError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: version,
            });
        }

        let length = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
        if length > MAX_FRAME_SIZE {
            return Err(RealtimeError::FrameTooLarge {
                size: length,
                max: MAX_FRAME_SIZE,
            });
        }

        if self.body_buf.len() < length {
            self.body_buf.resize(length, 0);
        }
        self.reader
            .read_exact(&mut self.body_buf[..length])
            .await
            .map_err(map_read_err)?;

        let msg = serde_json::from_slice(&self.body_buf[..length])?;
        Ok(msg)
    }

    /// 接收消息（read_frame 的别名）
    pub async fn recv<M: DeserializeOwned>(&mut self) -> Result<M> {
        self.read_frame().await
    }
}

/// 帧写入器
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 编码并写入一帧消息
    ///
    /// 帧头与消息体拼成单个缓冲一次写出。
    pub async fn write_frame<M: Serialize>(&mut self, msg: &M) -> Result<()> {
        let body = serde_json::to_vec(msg)?;
        if body.len() > MAX_FRAME_SIZE {
            return Err(RealtimeError::FrameTooLarge {
                size: body.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
        frame.push(PROTOCOL_VERSION);
        frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frame.extend_from_slice(&body);

        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// 发送消息（write_frame 的别名）
    pub async fn send<M: Serialize>(&mut self, msg: &M) -> Result<()> {
        self.write_frame(msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{event_type, Envelope, Request};
    use serde_json::json;
    use std::io::Cursor;

    /// 手工拼一帧原始字节
    fn raw_frame(version: u8, body: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
        frame.push(version);
        frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frame.extend_from_slice(body);
        frame
    }

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let mut buffer = Vec::new();

        {
            let mut writer = FrameWriter::new(&mut buffer);
            let msg = Request::new("playCard", json!({ "cards": ["A_spades"] }));
            writer.write_frame(&msg).await.unwrap();
        }

        {
            let mut reader = FrameReader::new(Cursor::new(&buffer));
            let msg: Request = reader.read_frame().await.unwrap();
            assert_eq!(msg.action, "playCard");
            assert_eq!(msg.payload["cards"][0], "A_spades");
        }
    }

    #[tokio::test]
    async fn test_envelope_frame() {
        let mut buffer = Vec::new();

        {
            let mut writer = FrameWriter::new(&mut buffer);
            let envelope = Envelope::new(
                event_type::PLAYER_PASSED,
                json!({ "playerId": "p1" }),
                Some("room-1".to_string()),
            );
            writer.write_frame(&envelope).await.unwrap();
        }

        {
            let mut reader = FrameReader::new(Cursor::new(&buffer));
            let envelope: Envelope = reader.read_frame().await.unwrap();
            assert_eq!(envelope.event_type, event_type::PLAYER_PASSED);
            assert_eq!(envelope.room_id.as_deref(), Some("room-1"));
        }
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let frame = raw_frame(PROTOCOL_VERSION + 1, b"{}");
        let mut reader = FrameReader::new(Cursor::new(frame));
        let result: Result<Request> = reader.read_frame().await;
        assert!(matches!(
            result,
            Err(RealtimeError::VersionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_decode_error_on_garbage_body() {
        let frame = raw_frame(PROTOCOL_VERSION, b"not json at all");
        let mut reader = FrameReader::new(Cursor::new(frame));
        let result: Result<Envelope> = reader.read_frame().await;
        assert!(matches!(result, Err(RealtimeError::Decode(_))));
    }

    #[tokio::test]
    async fn test_eof_maps_to_connection_closed() {
        let mut reader = FrameReader::new(Cursor::new(Vec::new()));
        let result: Result<Request> = reader.read_frame().await;
        assert!(matches!(result, Err(RealtimeError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_frame_too_large_rejected() {
        let mut header = vec![PROTOCOL_VERSION];
        header.extend_from_slice(&((MAX_FRAME_SIZE as u32) + 1).to_be_bytes());
        let mut reader = FrameReader::new(Cursor::new(header));
        let result: Result<Request> = reader.read_frame().await;
        assert!(matches!(result, Err(RealtimeError::FrameTooLarge { .. })));
    }
}
