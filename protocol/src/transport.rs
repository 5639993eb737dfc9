//! 传输层抽象
//!
//! Transport trait 把握手、路由等协议逻辑与具体通道实现解耦：实时通道
//! 供应商可以整体替换（TCP、WebSocket 网关等）而不触碰上层；客户端
//! 测试也经由此接口注入测试传输。

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{RealtimeError, Result};
use crate::CONNECT_TIMEOUT;

/// 传输层配置
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// 连接超时时间
    pub connect_timeout: Duration,
    /// 是否禁用 Nagle 算法（TCP nodelay）
    pub nodelay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            nodelay: true, // 对局消息小而频繁，对延迟敏感
        }
    }
}

/// 客户端侧的传输抽象
///
/// 一个实现对应一条双工通道；建立后分离为独立的读写端供并发使用。
pub trait Transport: Send + Sync + Sized {
    /// 读取端类型
    type Reader: AsyncRead + Unpin + Send + 'static;
    /// 写入端类型
    type Writer: AsyncWrite + Unpin + Send + 'static;

    /// 连接到 `addr`（"host:port" 形式），受 `config` 的超时约束
    fn connect(
        addr: &str,
        config: &TransportConfig,
    ) -> impl std::future::Future<Output = Result<Self>> + Send;

    /// 分离读写端
    fn split(self) -> (Self::Reader, Self::Writer);
}

/// 服务端侧的监听抽象
pub trait TransportListener: Send + Sync + Sized {
    /// 对应的传输类型
    type Transport: Transport;

    /// 绑定地址并开始监听
    fn bind(addr: &str) -> impl std::future::Future<Output = Result<Self>> + Send;

    /// 接受新连接
    fn accept(&self) -> impl std::future::Future<Output = Result<Self::Transport>> + Send;

    /// 实际绑定到的本地地址（绑定 ":0" 时由系统分配端口）
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

// ============================================================================
// TCP 实现
// ============================================================================

/// TCP 传输实现
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// 包装服务端 accept 到的流
    fn accepted(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// 对端地址
    pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}

impl Transport for TcpTransport {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    async fn connect(addr: &str, config: &TransportConfig) -> Result<Self> {
        let stream = timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| RealtimeError::ConnectionTimeout)?
            .map_err(RealtimeError::Io)?;

        stream.set_nodelay(config.nodelay)?;
        Ok(Self { stream })
    }

    fn split(self) -> (Self::Reader, Self::Writer) {
        self.stream.into_split()
    }
}

/// TCP 监听器实现
pub struct TcpListener {
    listener: tokio::net::TcpListener,
}

impl TransportListener for TcpListener {
    type Transport = TcpTransport;

    async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(RealtimeError::Io)?;
        Ok(Self { listener })
    }

    async fn accept(&self) -> Result<TcpTransport> {
        let (stream, _addr) = self.listener.accept().await.map_err(RealtimeError::Io)?;
        TcpTransport::accepted(stream)
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_assigns_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        assert!(listener.local_addr().unwrap().port() > 0);
    }

    #[tokio::test]
    async fn test_connect_and_accept() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client_handle = tokio::spawn(async move {
            TcpTransport::connect(&addr.to_string(), &TransportConfig::default()).await
        });

        let server_transport = listener.accept().await.unwrap();
        let client_transport = client_handle.await.unwrap().unwrap();

        // 两端互相看到对方的地址
        assert_eq!(
            server_transport.peer_addr().unwrap().ip(),
            client_transport.peer_addr().unwrap().ip()
        );
    }

    #[tokio::test]
    async fn test_connect_refused_is_io_error() {
        // 端口 1 基本不会有监听者
        let config = TransportConfig {
            connect_timeout: Duration::from_secs(1),
            nodelay: true,
        };
        let result = TcpTransport::connect("127.0.0.1:1", &config).await;
        assert!(matches!(
            result,
            Err(RealtimeError::Io(_)) | Err(RealtimeError::ConnectionTimeout)
        ));
    }
}
