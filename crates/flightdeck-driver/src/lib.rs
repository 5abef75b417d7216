//! 驱动层模块
//!
//! 本模块提供飞行仿真核心的并发部分，包括：
//! - 锁包装原语（每实例锁 / 共享锁 / 条件变量锁）
//! - 状态管理器（互斥锁 + 条件变量，锁外通知）
//! - 钩子系统：状态变更回调、快照录制
//!
//! # 使用场景
//!
//! 由外部驱动（仿真循环、GUI、自动驾驶回调）调用 [`StateManager::advance`]
//! 推进状态；观察者通过 [`StateCallback`] 接收每一个新安装的快照。

mod error;
pub mod hooks;
mod manager;
pub mod recording;
pub mod sync;

pub use error::{CallbackError, DriverError};
pub use hooks::{FnCallback, HookManager, StateCallback};
pub use manager::StateManager;
pub use recording::{RecordedState, SnapshotRecorder};
pub use sync::{
    Condition, ConditionLock, ConditionLocked, ConditionScope, InstanceLock, InstanceLocked,
    LockScope, LockSelector, LockTarget, LockWrapper, SharedLock, with_lock,
};
