//! 掼蛋实时客户端库
//!
//! 提供带自动重连的连接管理 ([`RealtimeClient`]) 与按事件类型分发的
//! 监听器注册 ([`EventDispatcher`])。

mod backoff;
mod client;
mod dispatcher;

pub use backoff::ReconnectPolicy;
pub use client::{ClientConfig, ConnectCallback, ErrorCallback, RealtimeClient, SessionState};
pub use dispatcher::{EventDispatcher, EventHandler};
