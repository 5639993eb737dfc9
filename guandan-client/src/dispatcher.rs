//! 事件分发器
//!
//! 按事件类型将入站信封分发给注册的监听器；通配符 `*` 监听器收到完整
//! 信封。分发器归连接实例所有，由使用方显式传递，不依赖全局可变状态。

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use protocol::{event_type, Envelope};
use serde_json::Value;
use tracing::error;

/// 事件监听器
///
/// 注册在具体类型下的监听器收到事件的 payload；注册在 `*` 下的监听器
/// 收到完整信封（序列化为 JSON 值）。
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// 事件分发器
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册监听器；同一监听器引用重复注册只生效一次（集合语义）
    pub fn add_event_listener(&self, event_type: &str, handler: EventHandler) {
        let mut handlers = self.lock();
        let bucket = handlers.entry(event_type.to_string()).or_default();
        if bucket.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            return;
        }
        bucket.push(handler);
    }

    /// 注销监听器；某类型最后一个监听器移除后释放该类型的注册桶
    pub fn remove_event_listener(&self, event_type: &str, handler: &EventHandler) {
        let mut handlers = self.lock();
        if let Some(bucket) = handlers.get_mut(event_type) {
            bucket.retain(|h| !Arc::ptr_eq(h, handler));
            if bucket.is_empty() {
                handlers.remove(event_type);
            }
        }
    }

    /// 分发一条信封
    ///
    /// 先按注册顺序调用该类型下的监听器（传 payload），再调用通配符
    /// 监听器（传完整信封）。单个监听器 panic 被隔离，不影响其余
    /// 监听器；监听器内再注册或注销监听器不会死锁。
    pub fn dispatch(&self, envelope: &Envelope) {
        // 先拷贝出监听器列表再释放锁，监听器回调不在临界区内执行
        let (typed, wildcard) = {
            let handlers = self.lock();
            (
                handlers
                    .get(&envelope.event_type)
                    .cloned()
                    .unwrap_or_default(),
                handlers
                    .get(event_type::WILDCARD)
                    .cloned()
                    .unwrap_or_default(),
            )
        };

        for handler in &typed {
            invoke(&envelope.event_type, handler, &envelope.payload);
        }

        if !wildcard.is_empty() {
            let full = serde_json::to_value(envelope).unwrap_or(Value::Null);
            for handler in &wildcard {
                invoke(event_type::WILDCARD, handler, &full);
            }
        }
    }

    /// 某类型当前注册的监听器数量
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.lock().get(event_type).map_or(0, Vec::len)
    }

    // 临界区都很短且不执行用户代码，poison 直接取回内部值
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<EventHandler>>> {
        self.handlers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn invoke(event_type: &str, handler: &EventHandler, value: &Value) {
    if catch_unwind(AssertUnwindSafe(|| handler(value))).is_err() {
        error!("Event listener for {} panicked", event_type);
    }
}
