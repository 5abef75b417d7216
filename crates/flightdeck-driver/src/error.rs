//! 驱动层错误类型定义

use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// 目标对象缺少预期的同步原语
    ///
    /// 属于使用错误：被包装的操作不会在无锁状态下执行。
    #[error("Missing synchronization primitive: {0}")]
    MissingPrimitive(&'static str),
}

/// 观察者回调错误
///
/// 由 [`StateCallback`](crate::hooks::StateCallback) 返回，
/// 状态管理器只记录日志，不向调用方传播。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Observer callback failed: {reason}")]
pub struct CallbackError {
    pub reason: String,
}

impl CallbackError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
