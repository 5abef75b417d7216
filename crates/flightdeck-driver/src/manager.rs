//! 状态管理器
//!
//! 持有唯一的"当前状态"单元，所有读写经由同一把互斥锁串行化。
//!
//! # 锁与通知
//!
//! ```text
//! update_state(f)
//!   ├─ 持锁: state = f(state); version += 1; notify_all()
//!   │        克隆回调列表快照（O(1)）
//!   └─ 释放锁后: 依次调用回调（传入本次安装的快照）
//! ```
//!
//! 用户代码（状态变换除外）永远不会在持锁时执行：回调和
//! `wait_for_condition` 的谓词都在锁外运行，因此它们可以安全地回调管理器。
//! 状态变换 `f` 在锁内执行，不得回调同一个管理器；锁不可重入，
//! 这种回调会被检测到并 panic，而不是静默死锁。

use flightdeck_physics::{FlightState, PhysicsEngine, StepOutcome};
use std::cell::RefCell;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::hooks::{HookManager, StateCallback};
use crate::sync::{Condition, ConditionScope};

thread_local! {
    /// 当前线程上正在执行状态变换的管理器地址（允许嵌套不同的管理器）
    static TRANSFORMING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// 状态变换期间的重入标记；离开作用域（包括 panic 展开）时移除
struct TransformMark(usize);

impl TransformMark {
    fn enter(addr: usize) -> Self {
        TRANSFORMING.with(|active| active.borrow_mut().push(addr));
        Self(addr)
    }
}

impl Drop for TransformMark {
    fn drop(&mut self) {
        TRANSFORMING.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(pos) = active.iter().rposition(|&addr| addr == self.0) {
                active.remove(pos);
            }
        });
    }
}

struct ManagerCell {
    state: FlightState,
    /// 已安装的状态数（构造时为 0）
    version: u64,
    hooks: HookManager,
}

/// 状态管理器
///
/// # 示例
///
/// ```rust
/// use flightdeck_driver::StateManager;
/// use flightdeck_physics::FlightState;
/// use std::sync::Arc;
/// use std::thread;
/// use std::time::Duration;
///
/// let manager = Arc::new(StateManager::new());
///
/// let waiter = {
///     let manager = Arc::clone(&manager);
///     thread::spawn(move || {
///         manager.wait_for_condition(|s| s.z > 100.0, Some(Duration::from_secs(5)))
///     })
/// };
///
/// manager.update_state(|s| FlightState { z: 150.0, ..s });
/// assert!(waiter.join().unwrap());
/// ```
pub struct StateManager {
    cell: Condition<ManagerCell>,
}

impl StateManager {
    /// 以默认状态创建
    pub fn new() -> Self {
        Self::with_state(FlightState::default())
    }

    /// 以给定初始状态创建
    pub fn with_state(state: FlightState) -> Self {
        Self {
            cell: Condition::new(ManagerCell {
                state,
                version: 0,
                hooks: HookManager::new(),
            }),
        }
    }

    fn addr(&self) -> usize {
        self as *const Self as usize
    }

    /// 加锁前检查：当前线程是否正处于本管理器的状态变换中
    fn lock_cell<R>(&self, op: impl FnOnce(&mut ConditionScope<'_, ManagerCell>) -> R) -> R {
        let addr = self.addr();
        let reentered = TRANSFORMING.with(|active| active.borrow().contains(&addr));
        if reentered {
            panic!(
                "StateManager re-entered from its own update_state transform \
                 (lock is not reentrant)"
            );
        }
        self.cell.with(op)
    }

    /// 当前状态的独立副本
    pub fn get_snapshot(&self) -> FlightState {
        self.lock_cell(|cell| cell.state)
    }

    /// 已安装的状态数
    pub fn version(&self) -> u64 {
        self.lock_cell(|cell| cell.version)
    }

    /// 原子地把当前状态替换为 `f(current)`，返回安装的快照
    ///
    /// `f` 在持锁时执行，期间不得调用同一个管理器的任何方法。
    /// 锁不可重入，需要读取当前状态时使用 `f` 的参数。
    ///
    /// # Panics
    ///
    /// `f` 内回调本管理器时 panic（当前状态保持不变）。
    pub fn update_state(&self, f: impl FnOnce(FlightState) -> FlightState) -> FlightState {
        self.update_state_with(|state| {
            let next = f(state);
            (next, next)
        })
    }

    /// 同 [`update_state`](Self::update_state)，变换可额外返回一个在同一把锁内计算的值
    ///
    /// 变换 panic 时锁被释放，当前状态保持不变，也不会触发通知。
    /// 重入限制与 `update_state` 相同。
    pub fn update_state_with<R>(&self, f: impl FnOnce(FlightState) -> (FlightState, R)) -> R {
        let (installed, hooks, version, extra) = self.lock_cell(|cell| {
            let (next, extra) = {
                let _mark = TransformMark::enter(self.addr());
                f(cell.state)
            };
            cell.state = next;
            cell.version += 1;
            cell.notify_all();
            (next, cell.hooks.clone(), cell.version, extra)
        });

        trace!(version, observers = hooks.len(), "State installed");
        hooks.trigger_all(&installed);
        extra
    }

    /// 积分一步：`update_state(s -> engine.integrate_step(s))`
    pub fn advance(&self, engine: &PhysicsEngine) -> StepOutcome {
        self.update_state_with(|state| {
            let outcome = engine.integrate_step(&state);
            (outcome.state, outcome)
        })
    }

    /// 安装默认状态，通知方式与 `update_state` 相同
    pub fn reset(&self) -> FlightState {
        debug!("Resetting flight state");
        self.update_state(|_| FlightState::default())
    }

    /// 注册观察者；已注册时返回 `false`
    pub fn register_observer(&self, callback: Arc<dyn StateCallback>) -> bool {
        let (added, count) = self.lock_cell(|cell| {
            let added = cell.hooks.add_callback(callback);
            (added, cell.hooks.len())
        });
        if added {
            debug!(observers = count, "Observer registered");
        }
        added
    }

    /// 注销观察者；未注册时返回 `false`
    ///
    /// 正在进行中的通知使用的是注销前的快照，可能仍会调用一次该观察者。
    pub fn unregister_observer(&self, callback: &Arc<dyn StateCallback>) -> bool {
        let (removed, count) = self.lock_cell(|cell| {
            let removed = cell.hooks.remove_callback(callback);
            (removed, cell.hooks.len())
        });
        if removed {
            debug!(observers = count, "Observer unregistered");
        }
        removed
    }

    pub fn observer_count(&self) -> usize {
        self.lock_cell(|cell| cell.hooks.len())
    }

    /// 阻塞直到谓词成立或超时
    ///
    /// - 谓词在锁外、针对私有快照求值
    /// - `timeout = None` 无限等待
    /// - 截止时间在进入时计算一次，虚假唤醒不会延长等待
    /// - 可能观察到任意一个满足谓词的状态，不保证是第一个
    ///
    /// 超时返回 `false`，这不是错误。
    pub fn wait_for_condition<P>(&self, mut predicate: P, timeout: Option<Duration>) -> bool
    where
        P: FnMut(&FlightState) -> bool,
    {
        // 溢出的超时等同于无限等待
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        self.lock_cell(|cell| {
            loop {
                let (snapshot, version) = (cell.state, cell.version);
                if cell.unlocked(|| predicate(&snapshot)) {
                    return true;
                }
                // 求值期间安装了新状态：不等待，直接重新检查
                if cell.version != version {
                    continue;
                }
                match deadline {
                    Some(deadline) => {
                        if Instant::now() >= deadline {
                            trace!("wait_for_condition timed out");
                            return false;
                        }
                        cell.wait_until(deadline);
                    },
                    None => cell.wait(),
                }
            }
        })
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallbackError;
    use crate::hooks::FnCallback;
    use flightdeck_physics::SimConfig;
    use parking_lot::Mutex;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Weak;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn recording_observer() -> (Arc<dyn StateCallback>, Arc<Mutex<Vec<FlightState>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback = Arc::new(FnCallback::new(move |state: &FlightState| {
            sink.lock().push(*state);
            Ok(())
        }));
        (callback, seen)
    }

    #[test]
    fn test_update_installs_and_returns_snapshot() {
        let manager = StateManager::new();
        let installed = manager.update_state(|s| FlightState { x: 3.0, ..s });

        assert_eq!(installed.x, 3.0);
        assert_eq!(manager.get_snapshot(), installed);
        assert_eq!(manager.version(), 1);
    }

    #[test]
    fn test_update_state_with_returns_extra_value() {
        let manager = StateManager::new();
        let old_z = manager.update_state_with(|s| (FlightState { z: 7.0, ..s }, s.z));
        assert_eq!(old_z, 0.0);
        assert_eq!(manager.get_snapshot().z, 7.0);
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let manager = StateManager::new();
        let before = manager.get_snapshot();
        manager.update_state(|s| FlightState { y: 1.0, ..s });
        assert_eq!(before.y, 0.0);
    }

    #[test]
    fn test_panicking_transform_leaves_state_unchanged() {
        let manager = StateManager::new();
        let (observer, seen) = recording_observer();
        manager.register_observer(observer);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            manager.update_state(|_| panic!("bad transform"));
        }));

        assert!(result.is_err());
        assert_eq!(manager.get_snapshot(), FlightState::default());
        assert_eq!(manager.version(), 0);
        assert!(seen.lock().is_empty());
        // 锁已释放
        manager.update_state(|s| s);
        assert_eq!(manager.version(), 1);
    }

    #[test]
    fn test_reentrant_transform_panics_instead_of_deadlocking() {
        let manager = StateManager::with_state(FlightState {
            z: 7.0,
            ..FlightState::default()
        });

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            manager.update_state(|s| FlightState {
                x: manager.get_snapshot().z,
                ..s
            });
        }));

        assert!(result.is_err());
        assert_eq!(manager.get_snapshot().x, 0.0);
        assert_eq!(manager.version(), 0);
        // 标记已清除，后续调用正常
        manager.update_state(|s| FlightState { x: 1.0, ..s });
        assert_eq!(manager.get_snapshot().x, 1.0);
    }

    #[test]
    fn test_transform_may_use_another_manager() {
        let source = StateManager::with_state(FlightState {
            z: 42.0,
            ..FlightState::default()
        });
        let target = StateManager::new();

        let installed = target.update_state(|s| FlightState {
            z: source.get_snapshot().z,
            ..s
        });
        assert_eq!(installed.z, 42.0);
    }

    #[test]
    fn test_observers_receive_each_installed_state() {
        let manager = StateManager::new();
        let (observer, seen) = recording_observer();
        assert!(manager.register_observer(observer));

        for z in 1..=3 {
            manager.update_state(|s| FlightState { z: z as f64, ..s });
        }

        let zs: Vec<f64> = seen.lock().iter().map(|s| s.z).collect();
        assert_eq!(zs, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_register_and_unregister_are_idempotent() {
        let manager = StateManager::new();
        let (observer, seen) = recording_observer();

        assert!(manager.register_observer(Arc::clone(&observer)));
        assert!(!manager.register_observer(Arc::clone(&observer)));
        assert_eq!(manager.observer_count(), 1);

        manager.update_state(|s| s);
        assert_eq!(seen.lock().len(), 1);

        assert!(manager.unregister_observer(&observer));
        assert!(!manager.unregister_observer(&observer));
        assert_eq!(manager.observer_count(), 0);

        manager.update_state(|s| s);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_observer_may_call_back_into_manager() {
        let manager = Arc::new(StateManager::new());
        let weak: Weak<StateManager> = Arc::downgrade(&manager);
        let consistent = Arc::new(AtomicUsize::new(0));
        let (late, late_seen) = recording_observer();

        let hits = Arc::clone(&consistent);
        let reentrant: Arc<dyn StateCallback> =
            Arc::new(FnCallback::new(move |state: &FlightState| {
                let manager = weak
                    .upgrade()
                    .ok_or_else(|| CallbackError::new("manager dropped"))?;
                // 锁已释放：读取快照与注册观察者都不会死锁
                if manager.get_snapshot() == *state {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
                manager.register_observer(Arc::clone(&late));
                Ok(())
            }));

        manager.register_observer(reentrant);
        manager.update_state(|s| FlightState { z: 1.0, ..s });
        assert_eq!(consistent.load(Ordering::SeqCst), 1);
        assert_eq!(manager.observer_count(), 2);
        // 新观察者从下一次更新开始生效
        assert!(late_seen.lock().is_empty());

        manager.update_state(|s| FlightState { z: 2.0, ..s });
        assert_eq!(late_seen.lock().len(), 1);
    }

    #[test]
    fn test_reset_installs_default_and_notifies() {
        let manager = StateManager::with_state(FlightState {
            z: 500.0,
            ..FlightState::default()
        });
        let (observer, seen) = recording_observer();
        manager.register_observer(observer);

        let installed = manager.reset();
        assert_eq!(installed, FlightState::default());
        assert_eq!(manager.get_snapshot(), FlightState::default());
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_advance_runs_physics_step() {
        let engine = PhysicsEngine::new(&SimConfig::default()).unwrap();
        let manager = StateManager::with_state(FlightState::default().with_command(10.0, 0.0, 0.0));

        let outcome = manager.advance(&engine);
        assert!(outcome.should_continue);
        assert_eq!(manager.get_snapshot(), outcome.state);
        assert_eq!(manager.get_snapshot().v, 2.0);
    }

    #[test]
    fn test_wait_returns_immediately_when_already_true() {
        let manager = StateManager::new();
        let start = Instant::now();
        assert!(manager.wait_for_condition(|s| s.z == 0.0, Some(Duration::from_secs(10))));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_times_out() {
        let manager = StateManager::new();
        let start = Instant::now();
        assert!(!manager.wait_for_condition(|s| s.z > 0.0, Some(Duration::from_millis(100))));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_wait_zero_timeout_checks_once() {
        let manager = StateManager::new();
        assert!(!manager.wait_for_condition(|s| s.z > 0.0, Some(Duration::ZERO)));
        assert!(manager.wait_for_condition(|s| s.z == 0.0, Some(Duration::ZERO)));
    }

    #[test]
    fn test_wait_predicate_may_read_manager() {
        let manager = StateManager::new();
        // 谓词在锁外执行
        assert!(manager.wait_for_condition(
            |s| manager.get_snapshot() == *s,
            Some(Duration::from_millis(50))
        ));
    }

    #[test]
    fn test_wait_woken_by_other_thread() {
        let manager = Arc::new(StateManager::new());

        let writer = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for step in 1..=20 {
                    thread::sleep(Duration::from_millis(2));
                    manager.update_state(|s| FlightState {
                        z: step as f64,
                        ..s
                    });
                }
            })
        };

        assert!(manager.wait_for_condition(|s| s.z >= 10.0, None));
        writer.join().unwrap();
        assert_eq!(manager.get_snapshot().z, 20.0);
    }
}
