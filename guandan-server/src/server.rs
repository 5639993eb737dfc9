//! 实时对局服务器核心实现

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use protocol::{
    Action, Connection, Envelope, RealtimeError, Request, TcpListener, TcpTransport,
    TransportListener, DISCONNECT_GRACE_PERIOD, HANDSHAKE_TIMEOUT, HEARTBEAT_TIMEOUT,
    MAX_CONNECTIONS,
};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{broadcast, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::grace::DisconnectionTracker;
use crate::registry::{ConnectionRecord, ConnectionStore, DisconnectionRecord, MemoryStore};
use crate::session::{self, RouteOutcome};

/// 房间广播消息，连接任务按自己的房间 ID 过滤
#[derive(Clone, Debug)]
pub struct RoomBroadcast {
    pub room_id: String,
    pub envelope: Envelope,
}

/// 服务器配置
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// 握手超时：连接建立后必须在此时间内完成 connect 握手
    pub handshake_timeout: Duration,
    /// 心跳超时：超过此时间无入站消息视为断线
    pub heartbeat_timeout: Duration,
    /// 断线宽限期
    pub grace_period: Duration,
    /// 最大连接数
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: HANDSHAKE_TIMEOUT,
            heartbeat_timeout: HEARTBEAT_TIMEOUT,
            grace_period: DISCONNECT_GRACE_PERIOD,
            max_connections: MAX_CONNECTIONS,
        }
    }
}

/// 共享状态
struct SharedState {
    config: ServerConfig,
    /// 连接存储
    store: Arc<dyn ConnectionStore>,
    /// 断线跟踪器
    tracker: Arc<DisconnectionTracker>,
    /// 当前连接数
    connection_count: AtomicU32,
}

impl SharedState {
    /// 增加连接数，超过上限则返回 false
    fn try_add_connection(&self) -> bool {
        loop {
            let current = self.connection_count.load(Ordering::SeqCst);
            if current >= self.config.max_connections as u32 {
                return false;
            }
            if self
                .connection_count
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// 减少连接数
    fn remove_connection(&self) {
        self.connection_count.fetch_sub(1, Ordering::SeqCst);
    }

    /// 当前在线连接数
    fn online_count(&self) -> u32 {
        self.connection_count.load(Ordering::SeqCst)
    }
}

/// 实时对局服务器
pub struct GameServer {
    state: Arc<SharedState>,
    broadcast_tx: broadcast::Sender<RoomBroadcast>,
    /// 关闭信号发送端
    shutdown_tx: watch::Sender<bool>,
    /// 关闭信号接收端（克隆给连接任务）
    shutdown_rx: watch::Receiver<bool>,
}

impl GameServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default(), Arc::new(MemoryStore::new()))
    }

    /// 用指定配置与存储创建服务器
    pub fn with_config(config: ServerConfig, store: Arc<dyn ConnectionStore>) -> Self {
        let (broadcast_tx, _) = broadcast::channel(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            state: Arc::new(SharedState {
                config,
                store,
                tracker: Arc::new(DisconnectionTracker::new()),
                connection_count: AtomicU32::new(0),
            }),
            broadcast_tx,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// 运行服务器（支持 graceful shutdown）
    pub async fn run(&self, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// 在已绑定的监听器上运行接收循环
    pub(crate) async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                // 接受新连接
                result = listener.accept() => {
                    match result {
                        Ok(transport) => {
                            if let Ok(peer) = transport.peer_addr() {
                                debug!("Accepted connection from {}", peer);
                            }

                            // 检查连接数限制
                            if !self.state.try_add_connection() {
                                warn!("Connection limit reached, rejecting new connection");
                                let mut conn = Connection::new(transport);
                                let _ = conn
                                    .send(&Envelope::error(503, "Server busy, please retry later", None))
                                    .await;
                                continue;
                            }

                            let state = Arc::clone(&self.state);
                            let broadcast_tx = self.broadcast_tx.clone();
                            let broadcast_rx = self.broadcast_tx.subscribe();
                            let shutdown_rx = self.shutdown_rx.clone();

                            tokio::spawn(async move {
                                if let Err(e) = handle_client(
                                    transport,
                                    Arc::clone(&state),
                                    broadcast_tx,
                                    broadcast_rx,
                                    shutdown_rx,
                                )
                                .await
                                {
                                    debug!("Client handler error: {}", e);
                                }
                                state.remove_connection();
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }

                // 监听 Ctrl+C 信号
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal, initiating graceful shutdown...");
                    self.shutdown().await;
                    break;
                }
            }
        }

        Ok(())
    }

    /// 执行 graceful shutdown：通知所有连接任务并等待退出
    async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);

        // 等待所有连接断开（最多等待 5 秒）
        let start = std::time::Instant::now();
        let timeout_duration = Duration::from_secs(5);

        while self.state.online_count() > 0 {
            if start.elapsed() > timeout_duration {
                warn!(
                    "Shutdown timeout, {} connections still active",
                    self.state.online_count()
                );
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        info!("Server shutdown complete");
    }
}

impl Default for GameServer {
    fn default() -> Self {
        Self::new()
    }
}

/// 处理单个客户端连接
async fn handle_client(
    transport: TcpTransport,
    state: Arc<SharedState>,
    broadcast_tx: broadcast::Sender<RoomBroadcast>,
    broadcast_rx: broadcast::Receiver<RoomBroadcast>,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    // 服务端为每个物理连接分配不透明的连接 ID
    let connection_id = format!("conn-{}", Uuid::new_v4().simple());
    let mut conn = Connection::new(transport);

    // 等待 connect 握手（带超时）
    let handshake = timeout(state.config.handshake_timeout, conn.recv::<Request>()).await;

    let params = match handshake {
        Ok(Ok(req)) => match Action::from_request(&req) {
            Ok(Action::Connect(params)) => params,
            Ok(_) => {
                conn.send(&Envelope::error(400, "Expected connect handshake", None))
                    .await?;
                return Ok(());
            }
            Err(e) => {
                // 握手被拒：回结构化错误后关闭
                conn.send(&session::error_event(&e)).await?;
                return Ok(());
            }
        },
        Ok(Err(RealtimeError::Decode(e))) => {
            debug!("Malformed handshake frame: {}", e);
            conn.send(&Envelope::error(400, "Invalid message body", None))
                .await?;
            return Ok(());
        }
        Ok(Err(e)) => {
            debug!("Failed to receive handshake: {}", e);
            return Ok(());
        }
        Err(_) => {
            debug!("Handshake timeout for {}", connection_id);
            conn.send(&Envelope::error(400, "Handshake timeout", None))
                .await?;
            return Ok(());
        }
    };

    // 宽限期内重连：撤销断线记录并取消逐出定时器
    let previous = state.tracker.rejoin(&params.player_id).await.map(|r| {
        debug!(
            "Player {} rejoined after {:?} offline",
            params.player_id,
            r.disconnected_at.elapsed()
        );
        r.previous_connection_id
    });
    let is_rejoin = previous.is_some();

    let record = ConnectionRecord::new(&connection_id, &params.player_id, &params.room_id, previous);
    state.store.put(record).await?;

    // 回 CONNECTED 确认，原样回显会话令牌
    conn.send(&session::connected_event(&params, &connection_id))
        .await?;

    if is_rejoin {
        info!(
            "Player {} reconnected as {} (room {})",
            params.player_id, connection_id, params.room_id
        );
        let _ = broadcast_tx.send(RoomBroadcast {
            room_id: params.room_id.clone(),
            envelope: session::reconnected_event(
                &params.player_id,
                &connection_id,
                &params.room_id,
            ),
        });
    } else {
        info!(
            "Player {} connected as {} (room {})",
            params.player_id, connection_id, params.room_id
        );
    }

    let player_id = params.player_id;
    let room_id = params.room_id;
    let (reader, writer) = conn.split();

    // 主消息循环；返回是否进入宽限期（服务器关闭时不进入）
    let track_on_exit = message_loop(
        &state,
        &connection_id,
        &player_id,
        &room_id,
        reader,
        writer,
        &broadcast_tx,
        broadcast_rx,
        shutdown_rx,
    )
    .await;

    // 清理连接记录
    if let Err(e) = state.store.delete(&connection_id).await {
        error!("Failed to delete connection {}: {}", connection_id, e);
    }

    if track_on_exit {
        // 玩家已用新连接抢先重连时不再登记宽限期
        let already_reconnected = match state.store.scan_by_room(&room_id).await {
            Ok(records) => records
                .iter()
                .any(|r| r.player_id == player_id && r.connection_id != connection_id),
            Err(e) => {
                error!("Failed to scan room {}: {}", room_id, e);
                false
            }
        };

        if !already_reconnected {
            let record = DisconnectionRecord::with_grace(
                &player_id,
                &connection_id,
                &room_id,
                state.config.grace_period,
            );
            let tx = broadcast_tx.clone();
            Arc::clone(&state.tracker)
                .track(record, move |expired| {
                    info!(
                        "Grace period expired, evicting player {} from room {}",
                        expired.player_id, expired.room_id
                    );
                    let envelope = session::player_disconnected_event(
                        &expired.player_id,
                        &expired.room_id,
                        "Grace period expired",
                    );
                    let _ = tx.send(RoomBroadcast {
                        room_id: expired.room_id.clone(),
                        envelope,
                    });
                })
                .await;
        }
    }

    Ok(())
}

/// 已连接后的消息循环，返回是否按非正常断开处理
#[allow(clippy::too_many_arguments)]
async fn message_loop(
    state: &Arc<SharedState>,
    connection_id: &str,
    player_id: &str,
    room_id: &str,
    mut reader: protocol::FrameReader<OwnedReadHalf>,
    mut writer: protocol::FrameWriter<OwnedWriteHalf>,
    broadcast_tx: &broadcast::Sender<RoomBroadcast>,
    mut broadcast_rx: broadcast::Receiver<RoomBroadcast>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> bool {
    loop {
        tokio::select! {
            // 接收客户端请求（带心跳超时）
            result = timeout(state.config.heartbeat_timeout, reader.recv::<Request>()) => {
                match result {
                    Ok(Ok(req)) => {
                        // 每一帧都必须能解析出既有连接
                        let outcome = match state.store.get(connection_id).await {
                            Ok(Some(mut record)) => match Action::from_request(&req) {
                                Ok(action) => {
                                    let outcome = session::route_action(&record, action);
                                    if outcome.touch {
                                        record.touch();
                                        if let Err(e) = state.store.put(record).await {
                                            error!("Failed to refresh connection {}: {}", connection_id, e);
                                            break;
                                        }
                                    }
                                    outcome
                                }
                                // 未知 action / 参数错误：回错误，连接保持打开
                                Err(e) => RouteOutcome {
                                    reply: Some(session::error_event(&e)),
                                    ..Default::default()
                                },
                            },
                            Ok(None) => {
                                let e = RealtimeError::ConnectionNotFound {
                                    connection_id: connection_id.to_string(),
                                };
                                RouteOutcome {
                                    reply: Some(session::error_event(&e)),
                                    ..Default::default()
                                }
                            }
                            Err(e) => {
                                error!("Store lookup failed for {}: {}", connection_id, e);
                                break;
                            }
                        };

                        if let Some(reply) = outcome.reply {
                            if let Err(e) = writer.send(&reply).await {
                                debug!("Failed to reply to {}: {}", player_id, e);
                                break;
                            }
                        }
                        if let Some(envelope) = outcome.broadcast {
                            let _ = broadcast_tx.send(RoomBroadcast {
                                room_id: room_id.to_string(),
                                envelope,
                            });
                        }
                    }
                    Ok(Err(RealtimeError::Decode(e))) => {
                        // 格式错误的帧：回 400，连接保持打开
                        warn!("Malformed frame from {}: {}", player_id, e);
                        if writer
                            .send(&Envelope::error(400, "Invalid message body", None))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Ok(Err(RealtimeError::ConnectionClosed)) => {
                        info!("Player {} disconnected", player_id);
                        break;
                    }
                    Ok(Err(e)) => {
                        warn!("Error receiving from {}: {}", player_id, e);
                        break;
                    }
                    Err(_) => {
                        // 心跳超时
                        warn!("Heartbeat timeout for player {}", player_id);
                        break;
                    }
                }
            }

            // 接收房间广播
            result = broadcast_rx.recv() => {
                match result {
                    Ok(msg) => {
                        if msg.room_id != room_id {
                            continue;
                        }
                        if let Err(e) = writer.send(&msg.envelope).await {
                            debug!("Failed to send to {}: {}", player_id, e);
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Player {} lagged {} events", player_id, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }

            // 监听 shutdown 信号
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Shutdown signal received, closing connection for {}", player_id);
                    let _ = writer
                        .send(&Envelope::error(503, "Server shutting down", None))
                        .await;
                    return false;
                }
            }
        }
    }

    true
}
