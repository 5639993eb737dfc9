//! 连接注册表
//!
//! 连接记录与断线记录的数据模型，以及连接存储接口。生命周期逻辑只依赖
//! [`ConnectionStore`] 接口，任何支持条件写与 TTL 过期的 KV 存储都可以
//! 替换内存实现；单元测试直接使用 [`MemoryStore`]。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use protocol::{now_millis, Result, CONNECTION_TTL_SECS};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;

/// 连接记录，按传输层连接 ID 索引
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    /// 传输层连接 ID，每个物理连接唯一
    pub connection_id: String,
    /// 逻辑玩家 ID
    pub player_id: String,
    /// 所在房间 ID
    pub room_id: String,
    /// 建立时间（Unix 毫秒）
    pub connected_at: u64,
    /// 最近活跃时间，心跳会刷新
    pub last_activity_at: u64,
    /// 过期时间（TTL）
    pub expires_at: u64,
    /// 是否为重连
    pub is_reconnection: bool,
    /// 重连前的连接 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_connection_id: Option<String>,
}

impl ConnectionRecord {
    /// 创建新的连接记录；带 previous_connection_id 时标记为重连
    pub fn new(
        connection_id: &str,
        player_id: &str,
        room_id: &str,
        previous_connection_id: Option<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            connection_id: connection_id.to_string(),
            player_id: player_id.to_string(),
            room_id: room_id.to_string(),
            connected_at: now,
            last_activity_at: now,
            expires_at: now + CONNECTION_TTL_SECS * 1000,
            is_reconnection: previous_connection_id.is_some(),
            previous_connection_id,
        }
    }

    /// 刷新活跃时间（心跳）
    pub fn touch(&mut self) {
        self.last_activity_at = now_millis();
    }

    /// 是否已过 TTL
    pub fn is_expired(&self) -> bool {
        now_millis() >= self.expires_at
    }
}

/// 断线记录
///
/// 非正常断开时创建，为玩家保留座位一个宽限期。由服务端断线跟踪器
/// 持有，对客户端不可见。
#[derive(Debug, Clone)]
pub struct DisconnectionRecord {
    pub player_id: String,
    /// 断开前的连接 ID
    pub previous_connection_id: String,
    pub room_id: String,
    pub disconnected_at: Instant,
    /// 宽限期截止时刻
    pub grace_period_ends_at: Instant,
}

impl DisconnectionRecord {
    /// 用指定宽限期创建断线记录
    pub fn with_grace(
        player_id: &str,
        connection_id: &str,
        room_id: &str,
        grace: Duration,
    ) -> Self {
        let now = Instant::now();
        Self {
            player_id: player_id.to_string(),
            previous_connection_id: connection_id.to_string(),
            room_id: room_id.to_string(),
            disconnected_at: now,
            grace_period_ends_at: now + grace,
        }
    }

    /// 是否仍在宽限期内
    #[allow(dead_code)]
    pub fn is_within_grace(&self) -> bool {
        Instant::now() < self.grace_period_ends_at
    }
}

/// 连接存储接口
///
/// 与生命周期逻辑之间的存储缝，内存实现之外也可以对接带条件写与
/// TTL 的外部 KV 存储。
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// 按连接 ID 查找；TTL 过期的记录视为不存在
    async fn get(&self, connection_id: &str) -> Result<Option<ConnectionRecord>>;

    /// 写入（或覆盖）一条记录
    async fn put(&self, record: ConnectionRecord) -> Result<()>;

    /// 删除并返回记录
    async fn delete(&self, connection_id: &str) -> Result<Option<ConnectionRecord>>;

    /// 列出某房间下的所有有效记录
    async fn scan_by_room(&self, room_id: &str) -> Result<Vec<ConnectionRecord>>;
}

/// 内存存储实现
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, ConnectionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionStore for MemoryStore {
    async fn get(&self, connection_id: &str) -> Result<Option<ConnectionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .get(connection_id)
            .filter(|r| !r.is_expired())
            .cloned())
    }

    async fn put(&self, record: ConnectionRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.connection_id.clone(), record);
        Ok(())
    }

    async fn delete(&self, connection_id: &str) -> Result<Option<ConnectionRecord>> {
        let mut records = self.records.write().await;
        Ok(records.remove(connection_id))
    }

    async fn scan_by_room(&self, room_id: &str) -> Result<Vec<ConnectionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.room_id == room_id && !r.is_expired())
            .cloned()
            .collect())
    }
}
