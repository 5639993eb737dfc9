//! 事件信封定义（服务端 -> 客户端）
//!
//! 服务端推送的所有实时消息统一封装为 `{ type, payload, timestamp, eventId, roomId? }`。
//! payload 的结构完全由 type 决定，对分发器不透明；消息按传输层送达顺序处理，
//! 不做重排也不做去重。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RealtimeError, Result};

/// 事件类型常量
pub mod event_type {
    /// 连接建立确认
    pub const CONNECTED: &str = "CONNECTED";
    /// 玩家断线（宽限期到期后的终局通知）
    pub const DISCONNECTED: &str = "DISCONNECTED";
    /// 玩家重连
    pub const RECONNECTED: &str = "RECONNECTED";
    /// 错误
    pub const ERROR: &str = "ERROR";
    /// 心跳响应
    pub const PONG: &str = "PONG";
    /// 玩家准备状态变更
    pub const PLAYER_READY: &str = "PLAYER_READY";
    /// 出牌
    pub const CARD_PLAYED: &str = "CARD_PLAYED";
    /// 过牌
    pub const PLAYER_PASSED: &str = "PLAYER_PASSED";
    /// 通配符，仅用于分发器注册，监听器会收到完整信封
    pub const WILDCARD: &str = "*";
}

/// 事件信封
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    /// 事件类型，不允许为空
    #[serde(rename = "type")]
    pub event_type: String,
    /// 事件负载，结构由 event_type 决定
    #[serde(default)]
    pub payload: Value,
    /// Unix 时间戳（毫秒）
    pub timestamp: u64,
    /// 事件 ID，用于日志排查
    #[serde(rename = "eventId")]
    pub event_id: String,
    /// 所属房间 ID
    #[serde(rename = "roomId", default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

impl Envelope {
    /// 创建新事件，自动填充时间戳与事件 ID
    pub fn new(event_type: &str, payload: Value, room_id: Option<String>) -> Self {
        let timestamp = now_millis();
        let event_id = format!(
            "{}-{}-{}",
            event_type,
            timestamp,
            uuid::Uuid::new_v4().simple()
        );
        Self {
            event_type: event_type.to_string(),
            payload,
            timestamp,
            event_id,
            room_id,
        }
    }

    /// 用带类型的负载创建事件
    pub fn with_payload<T: Serialize>(
        event_type: &str,
        payload: &T,
        room_id: Option<String>,
    ) -> Self {
        Self::new(event_type, to_value(payload), room_id)
    }

    /// 创建 ERROR 事件
    pub fn error(code: u16, message: impl Into<String>, room_id: Option<String>) -> Self {
        Self::with_payload(
            event_type::ERROR,
            &ErrorPayload {
                code,
                message: message.into(),
            },
            room_id,
        )
    }

    /// 校验信封是否合法
    pub fn validate(&self) -> Result<()> {
        if self.event_type.is_empty() {
            return Err(RealtimeError::Validation { field: "type" });
        }
        Ok(())
    }
}

/// 当前 Unix 时间戳（毫秒）
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn to_value<T: Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload).unwrap_or(Value::Null)
}

/// CONNECTED 事件负载
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    pub player_id: String,
    pub connection_id: String,
    /// 握手时提供的会话令牌原样回传，未提供则为空字符串
    pub session_token: String,
}

/// DISCONNECTED 事件负载
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectedPayload {
    pub player_id: String,
    pub reason: String,
}

/// RECONNECTED 事件负载
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectedPayload {
    pub player_id: String,
    pub connection_id: String,
}

/// ERROR 事件负载
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// HTTP 等价状态码
    pub code: u16,
    pub message: String,
}

/// PONG 事件负载
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PongPayload {
    pub timestamp: u64,
}

/// PLAYER_READY 事件负载
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerReadyPayload {
    pub player_id: String,
    pub is_ready: bool,
}

/// CARD_PLAYED 事件负载
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardPlayedPayload {
    pub player_id: String,
    /// 牌面内容对本层不透明，原样透传
    pub cards: Value,
}

/// PLAYER_PASSED 事件负载
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPassedPayload {
    pub player_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_serialize_camel_case() {
        let envelope = Envelope::with_payload(
            event_type::CONNECTED,
            &ConnectedPayload {
                player_id: "p1".to_string(),
                connection_id: "conn-1".to_string(),
                session_token: "".to_string(),
            },
            Some("room-1".to_string()),
        );

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "CONNECTED");
        assert_eq!(json["roomId"], "room-1");
        assert_eq!(json["payload"]["playerId"], "p1");
        assert_eq!(json["payload"]["connectionId"], "conn-1");
        assert_eq!(json["payload"]["sessionToken"], "");
        assert!(json["eventId"].as_str().unwrap().starts_with("CONNECTED-"));
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = Envelope::error(400, "Unknown action: dance", None);
        let bytes = serde_json::to_vec(&envelope).unwrap();
        let decoded: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope, decoded);
        assert_eq!(decoded.room_id, None);

        let payload: ErrorPayload = serde_json::from_value(decoded.payload).unwrap();
        assert_eq!(payload.code, 400);
    }

    #[test]
    fn test_envelope_missing_payload_defaults_to_null() {
        let decoded: Envelope = serde_json::from_str(
            r#"{"type":"PONG","timestamp":1,"eventId":"PONG-1-x"}"#,
        )
        .unwrap();
        assert!(decoded.payload.is_null());
        assert!(decoded.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_type() {
        let mut envelope = Envelope::new("PONG", Value::Null, None);
        envelope.event_type.clear();
        assert!(matches!(
            envelope.validate(),
            Err(RealtimeError::Validation { field: "type" })
        ));
    }
}
