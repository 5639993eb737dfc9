//! 重连退避策略
//!
//! 指数退避：第 K 次重连前等待 `base * multiplier^(K-1)`，并受延迟
//! 上限约束；达到次数上限后不再调度。

use std::time::Duration;

use protocol::{
    DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_DELAY, MAX_RECONNECT_DELAY,
    RECONNECT_BACKOFF_MULTIPLIER,
};

/// 重连策略
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    /// 是否自动重连
    pub enabled: bool,
    /// 重连次数上限
    pub max_attempts: u32,
    /// 基础延迟
    pub base_delay: Duration,
    /// 退避倍率
    pub multiplier: u32,
    /// 延迟上限
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            multiplier: RECONNECT_BACKOFF_MULTIPLIER,
            max_delay: MAX_RECONNECT_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// 不自动重连的策略
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// 第 `attempt` 次重连（从 0 计）前应等待的延迟；
    /// 次数用尽或未启用时返回 None
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if !self.enabled || attempt >= self.max_attempts {
            return None;
        }
        let factor = self.multiplier.saturating_pow(attempt);
        let delay = self.base_delay.saturating_mul(factor);
        Some(delay.min(self.max_delay))
    }
}
