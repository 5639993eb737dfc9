//! 错误类型定义

use thiserror::Error;

/// 实时协议错误类型
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 帧解码失败（JSON 格式错误）
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// 协议版本不匹配
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    /// 帧大小超限
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,

    /// 缺少必填字段
    #[error("Missing required field: {field}")]
    Validation { field: &'static str },

    /// 连接记录不存在
    #[error("Connection not found: {connection_id}")]
    ConnectionNotFound { connection_id: String },

    /// 未知的 action
    #[error("Unknown action: {action}")]
    UnknownAction { action: String },

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RealtimeError {
    /// 对应的 HTTP 等价状态码，用于 ERROR 事件的 code 字段
    pub fn status_code(&self) -> u16 {
        match self {
            RealtimeError::Decode(_)
            | RealtimeError::VersionMismatch { .. }
            | RealtimeError::FrameTooLarge { .. }
            | RealtimeError::Validation { .. }
            | RealtimeError::UnknownAction { .. } => 400,
            RealtimeError::ConnectionNotFound { .. } => 404,
            RealtimeError::Io(_)
            | RealtimeError::ConnectionTimeout
            | RealtimeError::ConnectionClosed
            | RealtimeError::Internal(_) => 500,
        }
    }

    /// 是否属于传输层错误（由客户端重连策略消化，不向上传播）
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RealtimeError::Io(_)
                | RealtimeError::ConnectionTimeout
                | RealtimeError::ConnectionClosed
        )
    }
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, RealtimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(RealtimeError::Validation { field: "roomId" }.status_code(), 400);
        assert_eq!(
            RealtimeError::UnknownAction {
                action: "dance".to_string()
            }
            .status_code(),
            400
        );
        assert_eq!(
            RealtimeError::ConnectionNotFound {
                connection_id: "conn-1".to_string()
            }
            .status_code(),
            404
        );
        assert_eq!(RealtimeError::ConnectionClosed.status_code(), 500);
        assert_eq!(RealtimeError::Internal("boom".to_string()).status_code(), 500);
    }

    #[test]
    fn test_transport_errors() {
        assert!(RealtimeError::ConnectionClosed.is_transport());
        assert!(RealtimeError::ConnectionTimeout.is_transport());
        assert!(!RealtimeError::Validation { field: "playerId" }.is_transport());
    }
}
