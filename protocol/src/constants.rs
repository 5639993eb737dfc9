//! 协议常量定义

use std::time::Duration;

/// 协议版本号
pub const PROTOCOL_VERSION: u8 = 1;

/// 消息帧最大大小
pub const MAX_FRAME_SIZE: usize = 65536;

/// 服务端最大连接数
pub const MAX_CONNECTIONS: usize = 100;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 握手超时（秒）- 连接后必须在此时间内发送 connect 请求
pub const HANDSHAKE_TIMEOUT_SECS: u64 = 30;

/// 心跳间隔（秒）- 客户端定期发送 ping
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// 心跳超时（秒）- 连续 3 个心跳周期无消息则视为断线
pub const HEARTBEAT_TIMEOUT_SECS: u64 = HEARTBEAT_INTERVAL_SECS * 3;

/// 断线宽限期（秒）- 到期后才将玩家逐出房间
pub const DISCONNECT_GRACE_PERIOD_SECS: u64 = 30;

/// 连接记录 TTL（秒）- 超过此时间的记录视为不存在
pub const CONNECTION_TTL_SECS: u64 = 60 * 60;

/// 默认重连次数上限
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 3;

/// 默认重连基础延迟（毫秒）
pub const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 1000;

/// 重连退避倍率
pub const RECONNECT_BACKOFF_MULTIPLIER: u32 = 2;

/// 重连延迟上限（毫秒）
pub const MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);

/// 握手超时 Duration
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(HANDSHAKE_TIMEOUT_SECS);

/// 心跳间隔 Duration
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(HEARTBEAT_INTERVAL_SECS);

/// 心跳超时 Duration
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(HEARTBEAT_TIMEOUT_SECS);

/// 断线宽限期 Duration
pub const DISCONNECT_GRACE_PERIOD: Duration = Duration::from_secs(DISCONNECT_GRACE_PERIOD_SECS);

/// 默认重连基础延迟 Duration
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration =
    Duration::from_millis(DEFAULT_RECONNECT_BASE_DELAY_MS);

/// 重连延迟上限 Duration
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_millis(MAX_RECONNECT_DELAY_MS);
