//! 连接封装
//!
//! 把传输层与帧编解码拼成带类型的收发接口。握手阶段用整体的
//! [`Connection`] 顺序收发；进入消息循环后 [`Connection::split`]
//! 拆成独立读写端供 `select!` 并发使用。

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{FrameReader, FrameWriter};
use crate::error::Result;
use crate::transport::Transport;

/// 连接封装
pub struct Connection<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> Connection<R, W> {
    /// 从传输层创建连接
    pub fn new<T: Transport<Reader = R, Writer = W>>(transport: T) -> Self {
        let (reader, writer) = transport.split();
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }

    /// 发送消息
    pub async fn send<M: Serialize>(&mut self, msg: &M) -> Result<()> {
        self.writer.write_frame(msg).await
    }

    /// 接收消息
    pub async fn recv<M: DeserializeOwned>(&mut self) -> Result<M> {
        self.reader.read_frame().await
    }

    /// 分离为读取端和写入端
    pub fn split(self) -> (FrameReader<R>, FrameWriter<W>) {
        (self.reader, self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event_type, ConnectParams, Envelope, Request, TcpListener, TcpTransport,
        TransportConfig, TransportListener,
    };
    use serde_json::json;

    #[tokio::test]
    async fn test_handshake_roundtrip_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client_handle = tokio::spawn(async move {
            let transport = TcpTransport::connect(&addr.to_string(), &TransportConfig::default())
                .await
                .unwrap();
            let mut conn = Connection::new(transport);

            conn.send(&Request::connect(&ConnectParams::new(
                "p1", "room-1", None,
            )))
            .await
            .unwrap();

            let envelope: Envelope = conn.recv().await.unwrap();
            assert_eq!(envelope.event_type, event_type::CONNECTED);
            assert_eq!(envelope.payload["connectionId"], "conn-1");
        });

        let mut conn = Connection::new(listener.accept().await.unwrap());

        let req: Request = conn.recv().await.unwrap();
        assert_eq!(req.action, "connect");
        assert_eq!(req.payload["playerId"], "p1");

        conn.send(&Envelope::new(
            event_type::CONNECTED,
            json!({ "playerId": "p1", "connectionId": "conn-1", "sessionToken": "" }),
            Some("room-1".to_string()),
        ))
        .await
        .unwrap();

        client_handle.await.unwrap();
    }
}
