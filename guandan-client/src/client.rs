//! 实时连接客户端核心实现
//!
//! 单个后台监督任务独占至多一个底层连接，通过命令通道接收
//! connect / send / disconnect，负责握手、心跳、入站分发与断线重连
//! 调度。状态变迁:
//! `Idle -> Connecting -> Connected -> (Closing | Reconnecting) -> Connecting -> ...`，
//! 只有显式 disconnect() 或重连次数用尽才回到终态。

use std::sync::{Arc, RwLock};
use std::time::Duration;

use protocol::{
    ConnectParams, Connection, Envelope, RealtimeError, Request, Transport, TransportConfig,
    HEARTBEAT_INTERVAL,
};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};
use tracing::{debug, info, warn};

use crate::backoff::ReconnectPolicy;
use crate::dispatcher::EventDispatcher;

/// 连接状态快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub is_connected: bool,
    pub is_reconnecting: bool,
    /// 已消耗的重连次数，成功打开后清零
    pub reconnect_attempts: u32,
}

/// 连接建立 / 断开回调
pub type ConnectCallback = Arc<dyn Fn() + Send + Sync>;

/// 传输错误回调
pub type ErrorCallback = Arc<dyn Fn(&RealtimeError) + Send + Sync>;

/// 客户端配置
#[derive(Clone)]
pub struct ClientConfig {
    /// 服务器地址；缺省时客户端被禁用，connect() 不做任何事
    pub url: Option<String>,
    /// 总开关，false 时同样禁用连接
    pub enabled: bool,
    /// 玩家 ID（握手必填）
    pub player_id: String,
    /// 房间 ID（握手必填）
    pub room_id: String,
    /// 会话令牌（可选，服务端原样回显）
    pub session_token: Option<String>,
    /// 重连策略
    pub reconnect: ReconnectPolicy,
    /// 传输配置
    pub transport: TransportConfig,
    /// 心跳间隔
    pub heartbeat_interval: Duration,
    /// 连接建立回调，每次成功打开恰好调用一次
    pub on_connect: Option<ConnectCallback>,
    /// 断开回调
    pub on_disconnect: Option<ConnectCallback>,
    /// 传输错误回调
    pub on_error: Option<ErrorCallback>,
}

impl ClientConfig {
    pub fn new(url: Option<String>, player_id: &str, room_id: &str) -> Self {
        Self {
            url,
            enabled: true,
            player_id: player_id.to_string(),
            room_id: room_id.to_string(),
            session_token: None,
            reconnect: ReconnectPolicy::default(),
            transport: TransportConfig::default(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            on_connect: None,
            on_disconnect: None,
            on_error: None,
        }
    }
}

/// 监督任务的命令
enum Command {
    Connect,
    Send(Request),
    Disconnect,
}

/// 连接关闭的方式
enum CloseKind {
    /// 显式断开，不触发重连
    Deliberate,
    /// 意外断开，交给重连策略
    Unexpected,
    /// 所有句柄已释放，监督任务退出
    HandleDropped,
}

/// 实时连接客户端句柄
///
/// 可克隆；底层连接由后台监督任务独占，同一时刻至多一个。
#[derive(Clone)]
pub struct RealtimeClient {
    cmd_tx: mpsc::Sender<Command>,
    state: Arc<RwLock<SessionState>>,
    dispatcher: Arc<EventDispatcher>,
}

impl RealtimeClient {
    /// 启动客户端后台任务
    pub fn spawn<T: Transport + 'static>(config: ClientConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let state = Arc::new(RwLock::new(SessionState::default()));
        let dispatcher = Arc::new(EventDispatcher::new());

        tokio::spawn(supervisor::<T>(
            config,
            Arc::clone(&state),
            Arc::clone(&dispatcher),
            cmd_rx,
        ));

        Self {
            cmd_tx,
            state,
            dispatcher,
        }
    }

    /// 请求建立连接
    ///
    /// 已连接、被禁用或未配置地址时为无操作；重连等待期间调用则立即
    /// 重试。
    pub fn connect(&self) {
        let _ = self.cmd_tx.try_send(Command::Connect);
    }

    /// 请求断开；幂等，并取消任何待定的重连
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.try_send(Command::Disconnect);
    }

    /// 发送请求
    ///
    /// 仅在连接打开时写出；否则记录告警后丢弃，不报错也不入队，
    /// 调用方应先检查 [`Self::is_connected`]。
    pub fn send(&self, request: Request) {
        if !self.is_connected() {
            warn!("Cannot send {}, not connected", request.action);
            return;
        }
        let _ = self.cmd_tx.try_send(Command::Send(request));
    }

    /// 当前状态快照
    pub fn state(&self) -> SessionState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected
    }

    pub fn is_reconnecting(&self) -> bool {
        self.state().is_reconnecting
    }

    /// 事件分发器，按事件类型注册监听器
    pub fn events(&self) -> Arc<EventDispatcher> {
        Arc::clone(&self.dispatcher)
    }
}

fn set_state(state: &Arc<RwLock<SessionState>>, f: impl FnOnce(&mut SessionState)) {
    let mut guard = state.write().unwrap_or_else(|e| e.into_inner());
    f(&mut guard);
}

fn snapshot(state: &Arc<RwLock<SessionState>>) -> SessionState {
    state.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 目标地址；未启用或地址为空时返回 None（连接被禁用）
fn target_url(config: &ClientConfig) -> Option<String> {
    if !config.enabled {
        return None;
    }
    config
        .url
        .as_deref()
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}

/// 监督循环：空闲等待 -> 连接会话 -> 退避重连
async fn supervisor<T: Transport>(
    config: ClientConfig,
    state: Arc<RwLock<SessionState>>,
    dispatcher: Arc<EventDispatcher>,
    mut cmd_rx: mpsc::Receiver<Command>,
) {
    'idle: loop {
        // 空闲：等待连接命令
        match cmd_rx.recv().await {
            None => return,
            Some(Command::Connect) => {}
            Some(Command::Disconnect) => continue 'idle,
            Some(Command::Send(req)) => {
                warn!("Cannot send {}, not connected", req.action);
                continue 'idle;
            }
        }

        let Some(url) = target_url(&config) else {
            debug!("Connection disabled or no URL configured");
            continue 'idle;
        };

        // 连接会话：首次连接与后续重连共用
        'session: loop {
            match T::connect(&url, &config.transport).await {
                Ok(transport) => {
                    // 成功打开：清零重连计数
                    set_state(&state, |s| {
                        s.is_connected = true;
                        s.is_reconnecting = false;
                        s.reconnect_attempts = 0;
                    });
                    info!("Connected to {}", url);
                    if let Some(cb) = &config.on_connect {
                        cb();
                    }

                    let close = run_connected::<T>(transport, &config, &dispatcher, &mut cmd_rx).await;

                    set_state(&state, |s| s.is_connected = false);
                    if let Some(cb) = &config.on_disconnect {
                        cb();
                    }
                    info!("Disconnected from {}", url);

                    match close {
                        CloseKind::Deliberate => {
                            set_state(&state, |s| s.is_reconnecting = false);
                            continue 'idle;
                        }
                        CloseKind::HandleDropped => return,
                        CloseKind::Unexpected => {}
                    }
                }
                Err(e) => {
                    // 打开失败按一次意外断开处理，计入重连预算
                    warn!("Connection attempt failed: {}", e);
                    if let Some(cb) = &config.on_error {
                        cb(&e);
                    }
                }
            }

            // 重连调度
            let attempt = snapshot(&state).reconnect_attempts;
            let Some(delay) = config.reconnect.delay_for(attempt) else {
                set_state(&state, |s| s.is_reconnecting = false);
                if config.reconnect.enabled {
                    info!("Reconnect attempts exhausted, waiting for explicit connect()");
                }
                continue 'idle;
            };

            set_state(&state, |s| {
                s.is_reconnecting = true;
                s.reconnect_attempts += 1;
            });
            info!(
                "Reconnecting in {:?} ({}/{})",
                delay,
                attempt + 1,
                config.reconnect.max_attempts
            );

            // 等待退避窗口；disconnect 会先取消待定的重连再改状态
            let backoff = sleep(delay);
            tokio::pin!(backoff);
            loop {
                tokio::select! {
                    _ = &mut backoff => continue 'session,
                    cmd = cmd_rx.recv() => match cmd {
                        None => return,
                        Some(Command::Disconnect) => {
                            set_state(&state, |s| s.is_reconnecting = false);
                            continue 'idle;
                        }
                        // 显式 connect()：取消等待，立即重试
                        Some(Command::Connect) => continue 'session,
                        Some(Command::Send(req)) => {
                            warn!("Cannot send {}, not connected", req.action);
                        }
                    }
                }
            }
        }
    }
}

/// 已连接状态：握手、心跳、入站分发与命令处理
async fn run_connected<T: Transport>(
    transport: T,
    config: &ClientConfig,
    dispatcher: &EventDispatcher,
    cmd_rx: &mut mpsc::Receiver<Command>,
) -> CloseKind {
    let conn = Connection::new(transport);
    let (mut reader, mut writer) = conn.split();

    // 打开后立即补发握手
    let handshake = Request::connect(&ConnectParams::new(
        &config.player_id,
        &config.room_id,
        config.session_token.clone(),
    ));
    if let Err(e) = writer.send(&handshake).await {
        warn!("Failed to send handshake: {}", e);
        if let Some(cb) = &config.on_error {
            cb(&e);
        }
        return CloseKind::Unexpected;
    }

    // 心跳定时器（跳过立即触发的第一次）
    let mut heartbeat = interval(config.heartbeat_interval);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            // 接收服务端事件
            result = reader.recv::<Envelope>() => {
                match result {
                    Ok(envelope) => {
                        // type 为空的信封按解码失败处理：丢帧，不分发
                        if envelope.validate().is_err() {
                            warn!("Dropping envelope with empty type");
                            continue;
                        }
                        dispatcher.dispatch(&envelope);
                    }
                    Err(RealtimeError::Decode(e)) => {
                        // 丢帧即可，连接保持打开，也不触发重连
                        warn!("Failed to parse message: {}", e);
                    }
                    Err(RealtimeError::ConnectionClosed) => {
                        info!("Server closed connection");
                        return CloseKind::Unexpected;
                    }
                    Err(e) => {
                        warn!("Receive error: {}", e);
                        if let Some(cb) = &config.on_error {
                            cb(&e);
                        }
                        return CloseKind::Unexpected;
                    }
                }
            }

            // 心跳
            _ = heartbeat.tick() => {
                if let Err(e) = writer.send(&Request::ping()).await {
                    warn!("Failed to send ping: {}", e);
                    return CloseKind::Unexpected;
                }
                debug!("Sent ping");
            }

            // 处理句柄命令
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Send(request)) => {
                        if let Err(e) = writer.send(&request).await {
                            warn!("Failed to send {}: {}", request.action, e);
                            return CloseKind::Unexpected;
                        }
                    }
                    Some(Command::Disconnect) => {
                        // 丢弃读写端即关闭底层连接
                        return CloseKind::Deliberate;
                    }
                    Some(Command::Connect) => {
                        // 已有打开的连接，connect() 为无操作
                        debug!("Already connected, ignoring connect()");
                    }
                    None => return CloseKind::HandleDropped,
                }
            }
        }
    }
}
