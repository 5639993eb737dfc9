//! 请求定义（客户端 -> 服务端）
//!
//! 客户端上行消息为 `{ action, payload? }`。原始请求在边界处立即收窄为
//! [`Action`] 枚举，未知 action 返回错误但不终止连接。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RealtimeError, Result};

/// action 名称常量
pub mod action {
    /// 握手
    pub const CONNECT: &str = "connect";
    /// 心跳
    pub const PING: &str = "ping";
    /// 出牌
    pub const PLAY_CARD: &str = "playCard";
    /// 过牌
    pub const PASS: &str = "pass";
    /// 准备状态变更
    pub const READY: &str = "ready";
}

/// 客户端发送给服务端的请求
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Request {
    pub action: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Request {
    pub fn new(action: &str, payload: Value) -> Self {
        Self {
            action: action.to_string(),
            payload,
        }
    }

    /// 心跳请求
    pub fn ping() -> Self {
        Self::new(action::PING, Value::Null)
    }

    /// 握手请求
    pub fn connect(params: &ConnectParams) -> Self {
        Self::new(
            action::CONNECT,
            serde_json::to_value(params).unwrap_or(Value::Null),
        )
    }
}

/// 握手参数，通过 connect 请求的 payload 传递
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub room_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl ConnectParams {
    pub fn new(player_id: &str, room_id: &str, session_token: Option<String>) -> Self {
        Self {
            player_id: player_id.to_string(),
            room_id: room_id.to_string(),
            session_token,
        }
    }

    /// 校验必填字段，playerId 与 roomId 缺一不可
    pub fn validate(&self) -> Result<()> {
        if self.player_id.is_empty() {
            return Err(RealtimeError::Validation { field: "playerId" });
        }
        if self.room_id.is_empty() {
            return Err(RealtimeError::Validation { field: "roomId" });
        }
        Ok(())
    }
}

/// ready 请求的 payload
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReadyParams {
    #[serde(default)]
    pub is_ready: bool,
}

/// 解码后立即收窄的请求动作
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// 握手，参数已通过校验
    Connect(ConnectParams),
    /// 心跳
    Ping,
    /// 出牌，牌面内容对本层不透明，原样广播
    PlayCard(Value),
    /// 过牌
    Pass,
    /// 准备状态变更
    Ready { is_ready: bool },
}

impl Action {
    /// 将原始请求收窄为带类型的动作
    pub fn from_request(req: &Request) -> Result<Self> {
        match req.action.as_str() {
            action::CONNECT => {
                let params: ConnectParams = if req.payload.is_null() {
                    ConnectParams::default()
                } else {
                    serde_json::from_value(req.payload.clone())?
                };
                params.validate()?;
                Ok(Action::Connect(params))
            }
            action::PING => Ok(Action::Ping),
            action::PLAY_CARD => Ok(Action::PlayCard(req.payload.clone())),
            action::PASS => Ok(Action::Pass),
            action::READY => {
                let params: ReadyParams = if req.payload.is_null() {
                    ReadyParams::default()
                } else {
                    serde_json::from_value(req.payload.clone())?
                };
                Ok(Action::Ready {
                    is_ready: params.is_ready,
                })
            }
            _ => Err(RealtimeError::UnknownAction {
                action: req.action.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ping_serializes_without_payload() {
        let json = serde_json::to_string(&Request::ping()).unwrap();
        assert_eq!(json, r#"{"action":"ping"}"#);
    }

    #[test]
    fn test_connect_roundtrip() {
        let req = Request::connect(&ConnectParams::new(
            "p1",
            "room-1",
            Some("tok".to_string()),
        ));
        let bytes = serde_json::to_vec(&req).unwrap();
        let decoded: Request = serde_json::from_slice(&bytes).unwrap();
        match Action::from_request(&decoded).unwrap() {
            Action::Connect(params) => {
                assert_eq!(params.player_id, "p1");
                assert_eq!(params.room_id, "room-1");
                assert_eq!(params.session_token.as_deref(), Some("tok"));
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_connect_missing_room_id_rejected() {
        let req = Request::new(action::CONNECT, json!({ "playerId": "p1" }));
        assert!(matches!(
            Action::from_request(&req),
            Err(RealtimeError::Validation { field: "roomId" })
        ));
    }

    #[test]
    fn test_connect_missing_player_id_rejected() {
        let req = Request::new(action::CONNECT, json!({ "roomId": "room-1" }));
        assert!(matches!(
            Action::from_request(&req),
            Err(RealtimeError::Validation { field: "playerId" })
        ));
    }

    #[test]
    fn test_connect_without_payload_rejected() {
        let req = Request::new(action::CONNECT, Value::Null);
        assert!(matches!(
            Action::from_request(&req),
            Err(RealtimeError::Validation { field: "playerId" })
        ));
    }

    #[test]
    fn test_unknown_action() {
        let req = Request::new("dance", Value::Null);
        match Action::from_request(&req) {
            Err(RealtimeError::UnknownAction { action }) => assert_eq!(action, "dance"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_ready_defaults_to_false() {
        let req = Request::new(action::READY, Value::Null);
        assert_eq!(
            Action::from_request(&req).unwrap(),
            Action::Ready { is_ready: false }
        );

        let req = Request::new(action::READY, json!({ "isReady": true }));
        assert_eq!(
            Action::from_request(&req).unwrap(),
            Action::Ready { is_ready: true }
        );
    }

    #[test]
    fn test_play_card_payload_is_opaque() {
        let cards = json!([{ "rank": "A", "suit": "spades" }]);
        let req = Request::new(action::PLAY_CARD, cards.clone());
        assert_eq!(
            Action::from_request(&req).unwrap(),
            Action::PlayCard(cards)
        );
    }
}
