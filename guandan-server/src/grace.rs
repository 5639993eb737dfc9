//! 断线宽限期跟踪
//!
//! 非正常断开后为玩家保留座位一个宽限期：期内重连则撤销记录并取消
//! 定时器，到期则恰好触发一次逐出回调。查找与取消在同一把锁内完成，
//! 与到期任务之间不存在先检查后取消的竞态。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::registry::DisconnectionRecord;

struct Pending {
    record: DisconnectionRecord,
    timer: JoinHandle<()>,
}

/// 断线跟踪器
///
/// 按玩家 ID 持有待定的断线记录，每条记录对应一个可取消的宽限期
/// 定时器。
#[derive(Default)]
pub struct DisconnectionTracker {
    pending: Mutex<HashMap<String, Pending>>,
}

impl DisconnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一条断线记录并启动宽限期定时器
    ///
    /// 到期时若记录仍未被重连撤销，执行 `on_expire` 恰好一次。同一
    /// 玩家再次断线会覆盖旧记录并作废旧定时器。
    pub async fn track<F>(self: Arc<Self>, record: DisconnectionRecord, on_expire: F)
    where
        F: FnOnce(DisconnectionRecord) + Send + 'static,
    {
        let player_id = record.player_id.clone();
        let deadline = record.grace_period_ends_at;

        // 先持锁再启动定时器：到期任务的 take 会阻塞在同一把锁上，
        // 保证插入先于摘取
        let mut pending = self.pending.lock().await;

        let tracker = Arc::clone(&self);
        let timer_key = player_id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(expired) = tracker.take(&timer_key).await {
                on_expire(expired);
            }
        });

        if let Some(old) = pending.insert(player_id.clone(), Pending { record, timer }) {
            debug!("Superseding pending disconnection for player {}", player_id);
            old.timer.abort();
        }
    }

    /// 玩家重连：撤销记录并取消定时器，返回被撤销的记录
    pub async fn rejoin(&self, player_id: &str) -> Option<DisconnectionRecord> {
        let mut pending = self.pending.lock().await;
        pending.remove(player_id).map(|p| {
            p.timer.abort();
            p.record
        })
    }

    /// 摘取到期记录，仅供定时器任务使用
    async fn take(&self, player_id: &str) -> Option<DisconnectionRecord> {
        let mut pending = self.pending.lock().await;
        pending.remove(player_id).map(|p| p.record)
    }

    /// 玩家是否有待定的断线记录
    #[allow(dead_code)]
    pub async fn is_pending(&self, player_id: &str) -> bool {
        self.pending.lock().await.contains_key(player_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn record(player_id: &str, connection_id: &str) -> DisconnectionRecord {
        DisconnectionRecord::with_grace(player_id, connection_id, "room-1", Duration::from_secs(30))
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoin_within_grace_cancels_eviction() {
        let tracker = Arc::new(DisconnectionTracker::new());
        let evictions = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&evictions);
        Arc::clone(&tracker)
            .track(record("p1", "conn-1"), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert!(tracker.is_pending("p1").await);

        // 宽限期 30 秒，10 秒后重连
        tokio::time::sleep(Duration::from_secs(10)).await;
        let rejoined = tracker.rejoin("p1").await.expect("record within grace");
        assert_eq!(rejoined.previous_connection_id, "conn-1");
        assert!(rejoined.is_within_grace());

        // 远超截止时间后也不应有逐出通知
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(evictions.load(Ordering::SeqCst), 0);
        assert!(!tracker.is_pending("p1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_fires_exactly_once() {
        let tracker = Arc::new(DisconnectionTracker::new());
        let evictions = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&evictions);
        Arc::clone(&tracker)
            .track(record("p1", "conn-1"), move |expired| {
                assert_eq!(expired.player_id, "p1");
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(evictions.load(Ordering::SeqCst), 1);
        assert!(!tracker.is_pending("p1").await);

        // 到期之后重连拿不到记录
        assert!(tracker.rejoin("p1").await.is_none());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(evictions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrack_supersedes_previous_record() {
        let tracker = Arc::new(DisconnectionTracker::new());
        let evicted = Arc::new(StdMutex::new(Vec::new()));

        let sink = Arc::clone(&evicted);
        Arc::clone(&tracker)
            .track(record("p1", "conn-1"), move |expired| {
                sink.lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(expired.previous_connection_id);
            })
            .await;

        // 10 秒后同一玩家再次断线，旧定时器作废
        tokio::time::sleep(Duration::from_secs(10)).await;
        let sink = Arc::clone(&evicted);
        Arc::clone(&tracker)
            .track(record("p1", "conn-2"), move |expired| {
                sink.lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(expired.previous_connection_id);
            })
            .await;

        // t=35s：第一条记录的截止时间已过，但它已被覆盖
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(evicted.lock().unwrap_or_else(|e| e.into_inner()).is_empty());

        // t=45s：第二条记录到期
        tokio::time::sleep(Duration::from_secs(10)).await;
        let seen = evicted.lock().unwrap_or_else(|e| e.into_inner()).clone();
        assert_eq!(seen, vec!["conn-2".to_string()]);
    }
}
