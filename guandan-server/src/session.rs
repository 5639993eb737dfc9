//! 连接生命周期逻辑
//!
//! 握手应答与消息路由的纯逻辑部分：给定连接记录与收窄后的动作，计算
//! 应答与广播，不做任何 IO。每个连接的状态变迁为
//! `Connecting -> Connected -> (GracePeriod -> Rejoined | Expired)`。

use protocol::{
    event_type, now_millis, Action, CardPlayedPayload, ConnectParams, ConnectedPayload,
    DisconnectedPayload, Envelope, PlayerPassedPayload, PlayerReadyPayload, PongPayload,
    RealtimeError, ReconnectedPayload,
};

use crate::registry::ConnectionRecord;

/// 路由结果
#[derive(Debug, Default)]
pub struct RouteOutcome {
    /// 回给当前连接的应答
    pub reply: Option<Envelope>,
    /// 广播到房间的事件
    pub broadcast: Option<Envelope>,
    /// 是否刷新连接的活跃时间（心跳）
    pub touch: bool,
}

/// 握手成功后的 CONNECTED 应答，回传解析出的连接 ID 并原样回显会话令牌
pub fn connected_event(params: &ConnectParams, connection_id: &str) -> Envelope {
    Envelope::with_payload(
        event_type::CONNECTED,
        &ConnectedPayload {
            player_id: params.player_id.clone(),
            connection_id: connection_id.to_string(),
            session_token: params.session_token.clone().unwrap_or_default(),
        },
        Some(params.room_id.clone()),
    )
}

/// 玩家重连的房间广播
pub fn reconnected_event(player_id: &str, connection_id: &str, room_id: &str) -> Envelope {
    Envelope::with_payload(
        event_type::RECONNECTED,
        &ReconnectedPayload {
            player_id: player_id.to_string(),
            connection_id: connection_id.to_string(),
        },
        Some(room_id.to_string()),
    )
}

/// 宽限期到期后的终局断线广播
pub fn player_disconnected_event(player_id: &str, room_id: &str, reason: &str) -> Envelope {
    Envelope::with_payload(
        event_type::DISCONNECTED,
        &DisconnectedPayload {
            player_id: player_id.to_string(),
            reason: reason.to_string(),
        },
        Some(room_id.to_string()),
    )
}

/// 将协议错误转换为 ERROR 应答
pub fn error_event(err: &RealtimeError) -> Envelope {
    Envelope::error(err.status_code(), err.to_string(), None)
}

/// 已连接状态下路由一条动作
pub fn route_action(record: &ConnectionRecord, action: Action) -> RouteOutcome {
    let room_id = record.room_id.clone();
    match action {
        Action::Connect(_) => RouteOutcome {
            reply: Some(Envelope::error(400, "Already connected", Some(room_id))),
            ..Default::default()
        },
        Action::Ping => RouteOutcome {
            reply: Some(Envelope::with_payload(
                event_type::PONG,
                &PongPayload {
                    timestamp: now_millis(),
                },
                None,
            )),
            touch: true,
            ..Default::default()
        },
        Action::PlayCard(cards) => RouteOutcome {
            broadcast: Some(Envelope::with_payload(
                event_type::CARD_PLAYED,
                &CardPlayedPayload {
                    player_id: record.player_id.clone(),
                    cards,
                },
                Some(room_id),
            )),
            ..Default::default()
        },
        Action::Pass => RouteOutcome {
            broadcast: Some(Envelope::with_payload(
                event_type::PLAYER_PASSED,
                &PlayerPassedPayload {
                    player_id: record.player_id.clone(),
                },
                Some(room_id),
            )),
            ..Default::default()
        },
        Action::Ready { is_ready } => RouteOutcome {
            broadcast: Some(Envelope::with_payload(
                event_type::PLAYER_READY,
                &PlayerReadyPayload {
                    player_id: record.player_id.clone(),
                    is_ready,
                },
                Some(room_id),
            )),
            ..Default::default()
        },
    }
}
