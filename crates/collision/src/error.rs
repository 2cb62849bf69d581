//! Collision 错误类型

use contracts::{CheckpointFault, CheckpointId, FaultKind};
use thiserror::Error;

/// Collision 错误
#[derive(Debug, Error)]
pub enum CollisionError {
    /// 无法连接到检查点事件源
    #[error("checkpoint {checkpoint}: connection to {address} failed: {message}")]
    ConnectionFailed {
        /// 检查点
        checkpoint: CheckpointId,
        /// 事件源地址
        address: String,
        /// 错误消息
        message: String,
    },

    /// 连接在送达事件前断开
    #[error("checkpoint {checkpoint}: connection to {address} closed before an event arrived")]
    ConnectionClosed {
        /// 检查点
        checkpoint: CheckpointId,
        /// 事件源地址
        address: String,
    },

    /// 当前线程不在 tokio runtime 内
    #[error("collision monitor requires a running tokio runtime")]
    NoRuntime,
}

impl CollisionError {
    /// 创建连接失败错误
    pub fn connection_failed(
        checkpoint: CheckpointId,
        address: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ConnectionFailed {
            checkpoint,
            address: address.into(),
            message: message.into(),
        }
    }

    /// 创建连接断开错误
    pub fn connection_closed(checkpoint: CheckpointId, address: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            checkpoint,
            address: address.into(),
        }
    }

    /// Convert into the fault record exposed through `CollisionSource::take_fault`.
    ///
    /// Returns `None` for errors that are not tied to a checkpoint.
    pub fn to_fault(&self) -> Option<CheckpointFault> {
        let (checkpoint, kind) = match self {
            Self::ConnectionFailed { checkpoint, .. } => (*checkpoint, FaultKind::ConnectionFailed),
            Self::ConnectionClosed { checkpoint, .. } => (*checkpoint, FaultKind::ConnectionClosed),
            Self::NoRuntime => return None,
        };
        Some(CheckpointFault {
            checkpoint,
            kind,
            message: self.to_string(),
        })
    }
}

/// Collision Result 类型别名
pub type Result<T> = std::result::Result<T, CollisionError>;
