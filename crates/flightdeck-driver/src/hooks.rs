//! 钩子系统（Hook System）
//!
//! 管理状态变更回调。状态管理器在每次安装新状态、释放锁之后依次触发回调。
//!
//! # 设计原则
//!
//! - **写时复制**: 回调列表为 `Arc<Vec<..>>`，取通知快照只需克隆一个 `Arc`
//! - **按身份比较**: 同一个 `Arc` 重复注册无效，注销按指针匹配
//! - **故障隔离**: 单个回调返回 `Err` 或 panic 只记录日志，不影响其余回调
//!
//! # 使用示例
//!
//! ```rust
//! use flightdeck_driver::hooks::{FnCallback, HookManager, StateCallback};
//! use flightdeck_physics::FlightState;
//! use std::sync::Arc;
//!
//! let mut hooks = HookManager::new();
//! let callback: Arc<dyn StateCallback> = Arc::new(FnCallback::new(|state: &FlightState| {
//!     println!("altitude = {}", state.z);
//!     Ok(())
//! }));
//!
//! assert!(hooks.add_callback(Arc::clone(&callback)));
//! assert!(!hooks.add_callback(callback));
//! hooks.trigger_all(&FlightState::default());
//! ```

use flightdeck_physics::FlightState;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, warn};

use crate::error::CallbackError;

/// 状态变更回调 Trait
///
/// 回调在状态管理器的锁之外执行，可以安全地回调管理器（例如读取快照、
/// 注册/注销观察者）。回调应尽快返回：通知是顺序执行的，耗时的回调会
/// 推迟后续回调以及调用 `update_state` 的线程。
pub trait StateCallback: Send + Sync {
    /// 新状态安装后调用
    ///
    /// `state` 是该次更新安装的状态快照，而不是之后的某个状态。
    fn on_state_changed(&self, state: &FlightState) -> Result<(), CallbackError>;
}

/// 把闭包适配为回调
pub struct FnCallback<F> {
    f: F,
}

impl<F> FnCallback<F>
where
    F: Fn(&FlightState) -> Result<(), CallbackError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> StateCallback for FnCallback<F>
where
    F: Fn(&FlightState) -> Result<(), CallbackError> + Send + Sync,
{
    fn on_state_changed(&self, state: &FlightState) -> Result<(), CallbackError> {
        (self.f)(state)
    }
}

/// 钩子管理器
///
/// 本身不是线程安全的，由状态管理器在锁内修改；`Clone` 只复制 `Arc`，
/// 得到的快照在锁外触发。
#[derive(Clone, Default)]
pub struct HookManager {
    callbacks: Arc<Vec<Arc<dyn StateCallback>>>,
}

impl HookManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加回调；已注册时返回 `false`
    pub fn add_callback(&mut self, callback: Arc<dyn StateCallback>) -> bool {
        if self.position(&callback).is_some() {
            return false;
        }
        Arc::make_mut(&mut self.callbacks).push(callback);
        true
    }

    /// 移除回调；未注册时返回 `false`
    pub fn remove_callback(&mut self, callback: &Arc<dyn StateCallback>) -> bool {
        match self.position(callback) {
            Some(index) => {
                Arc::make_mut(&mut self.callbacks).remove(index);
                true
            },
            None => false,
        }
    }

    /// 移除所有回调
    pub fn clear(&mut self) {
        self.callbacks = Arc::default();
    }

    /// 依次触发所有回调
    ///
    /// 每个回调的 `Err` 以 `warn` 记录，panic 以 `error` 记录，然后继续下一个。
    pub fn trigger_all(&self, state: &FlightState) {
        for (index, callback) in self.callbacks.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| callback.on_state_changed(state))) {
                Ok(Ok(())) => {},
                Ok(Err(e)) => warn!(observer = index, "State observer failed: {}", e),
                Err(payload) => error!(
                    observer = index,
                    "State observer panicked: {}",
                    panic_message(payload.as_ref())
                ),
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    fn position(&self, callback: &Arc<dyn StateCallback>) -> Option<usize> {
        // 只比较数据指针：同一对象的胖指针可能带有不同的 vtable
        let target = Arc::as_ptr(callback) as *const ();
        self.callbacks
            .iter()
            .position(|existing| Arc::as_ptr(existing) as *const () == target)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
