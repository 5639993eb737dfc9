//! 掼蛋实时通信共享协议库
//!
//! 包含:
//! - 消息类型定义 (Request/Action, Envelope)
//! - 传输层抽象 (Transport trait)
//! - 帧编解码 (Codec)
//! - 连接封装 (Connection)
//! - 牌面资源映射 (cards)

mod cards;
mod codec;
mod connection;
mod constants;
mod error;
mod event;
mod message;
mod transport;

pub use cards::{card_svg_path, is_servable_asset};
pub use codec::{FrameReader, FrameWriter};
pub use connection::Connection;
pub use constants::*;
pub use error::{RealtimeError, Result};
pub use event::{
    event_type, now_millis, CardPlayedPayload, ConnectedPayload, DisconnectedPayload, Envelope,
    ErrorPayload, PlayerPassedPayload, PlayerReadyPayload, PongPayload, ReconnectedPayload,
};
pub use message::{action, Action, ConnectParams, ReadyParams, Request};
pub use transport::{TcpListener, TcpTransport, Transport, TransportConfig, TransportListener};
