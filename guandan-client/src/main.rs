//! 掼蛋实时终端客户端
//!
//! 连接实时服务器并打印房间事件，从标准输入读取命令:
//! `ready` / `unready` / `pass` / `play <牌>...` / `quit`

use std::sync::Arc;

use anyhow::Result;
use guandan_client::{ClientConfig, RealtimeClient};
use protocol::{action, event_type, Request, TcpTransport};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "127.0.0.1:9000";

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("guandan_client=debug".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let player_id = args
        .next()
        .unwrap_or_else(|| format!("player-{}", std::process::id()));
    let room_id = args.next().unwrap_or_else(|| "lobby".to_string());

    println!("连接 {} (玩家 {}, 房间 {})", addr, player_id, room_id);

    let config = ClientConfig::new(Some(addr), &player_id, &room_id);
    let client = RealtimeClient::spawn::<TcpTransport>(config);

    // 打印所有房间事件
    client.events().add_event_listener(
        event_type::WILDCARD,
        Arc::new(|value| {
            let time = value["timestamp"]
                .as_u64()
                .and_then(|ts| chrono::DateTime::from_timestamp_millis(ts as i64))
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_default();
            println!(
                "[{}] {} {}",
                time,
                value["type"].as_str().unwrap_or("?"),
                value["payload"]
            );
        }),
    );

    client.connect();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("ready") => client.send(Request::new(action::READY, json!({ "isReady": true }))),
            Some("unready") => {
                client.send(Request::new(action::READY, json!({ "isReady": false })))
            }
            Some("pass") => client.send(Request::new(action::PASS, serde_json::Value::Null)),
            Some("play") => {
                let cards: Vec<&str> = parts.collect();
                client.send(Request::new(action::PLAY_CARD, json!({ "cards": cards })));
            }
            Some("quit") => break,
            Some(other) => eprintln!("未知命令: {}", other),
            None => {}
        }
    }

    client.disconnect();
    Ok(())
}
