//! 锁包装原语
//!
//! 把"持锁执行一段操作"集中到少数几个辅助函数中，调用方从不手写加锁/解锁。
//! 所有锁均为 `parking_lot`（无毒化），守卫为 RAII：无论正常返回还是 panic，
//! 离开作用域时都会释放。
//!
//! # 三种锁定方式
//!
//! | 选择器 | 锁来源 | 用途 |
//! |---|---|---|
//! | [`InstanceLock`] | 目标对象自己的互斥锁 | 每实例独立加锁 |
//! | [`SharedLock`] | 固定的共享互斥锁 | 多个对象共用一把锁 |
//! | [`ConditionLock`] | 目标对象的条件变量（及其互斥锁） | 临界区内可直接 `notify_*` / `wait` |
//!
//! 三者都通过同一个工厂 [`LockWrapper`] 生成被包装的操作。选择器找不到锁时
//! 返回 [`DriverError::MissingPrimitive`]，绝不在无锁状态下执行操作。
//!
//! # 示例
//!
//! ```rust
//! use flightdeck_driver::sync::{InstanceLock, InstanceLocked, LockScope, LockWrapper};
//! use parking_lot::Mutex;
//!
//! struct Counter {
//!     value: Mutex<u64>,
//! }
//!
//! impl InstanceLocked for Counter {
//!     type Data = u64;
//!     fn instance_lock(&self) -> Option<&Mutex<u64>> {
//!         Some(&self.value)
//!     }
//! }
//!
//! let add = LockWrapper::new(InstanceLock).wrap(|scope: &mut LockScope<'_, u64>, n: u64| {
//!     **scope += n;
//!     **scope
//! });
//!
//! let counter = Counter { value: Mutex::new(0) };
//! assert_eq!(add(&counter, 5).unwrap(), 5);
//! ```

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;

use crate::error::DriverError;

/// 持锁执行 `op`，返回其结果
pub fn with_lock<D, R>(lock: &Mutex<D>, op: impl FnOnce(&mut D) -> R) -> R {
    let mut guard = lock.lock();
    op(&mut guard)
}

/// 互斥锁 + 条件变量
///
/// 条件变量与数据共用同一把互斥锁，因此临界区内的信号操作无需再次加锁。
#[derive(Debug, Default)]
pub struct Condition<D> {
    data: Mutex<D>,
    signal: Condvar,
}

impl<D> Condition<D> {
    pub const fn new(data: D) -> Self {
        Self {
            data: Mutex::new(data),
            signal: Condvar::new(),
        }
    }

    /// 持锁执行 `op`
    pub fn with<R>(&self, op: impl FnOnce(&mut ConditionScope<'_, D>) -> R) -> R {
        let mut scope = self.enter();
        op(&mut scope)
    }

    /// 唤醒所有等待者（不持锁）
    pub fn notify_all(&self) -> usize {
        self.signal.notify_all()
    }

    pub fn into_inner(self) -> D {
        self.data.into_inner()
    }

    fn enter(&self) -> ConditionScope<'_, D> {
        ConditionScope {
            guard: self.data.lock(),
            signal: &self.signal,
        }
    }
}

/// 条件变量临界区
///
/// 解引用得到被保护的数据；离开作用域时释放锁。
pub struct ConditionScope<'a, D> {
    guard: MutexGuard<'a, D>,
    signal: &'a Condvar,
}

impl<D> ConditionScope<'_, D> {
    pub fn notify_all(&self) -> usize {
        self.signal.notify_all()
    }

    pub fn notify_one(&self) -> bool {
        self.signal.notify_one()
    }

    /// 释放锁并等待唤醒，返回前重新持锁
    ///
    /// 可能出现虚假唤醒，调用方须在循环中重新检查条件。
    pub fn wait(&mut self) {
        self.signal.wait(&mut self.guard);
    }

    /// 等待唤醒或到达截止时间；超时返回 `true`
    pub fn wait_until(&mut self, deadline: Instant) -> bool {
        self.signal.wait_until(&mut self.guard, deadline).timed_out()
    }

    /// 临时释放锁执行 `f`，返回前重新持锁
    pub fn unlocked<R>(&mut self, f: impl FnOnce() -> R) -> R {
        MutexGuard::unlocked(&mut self.guard, f)
    }
}

impl<D> Deref for ConditionScope<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.guard
    }
}

impl<D> DerefMut for ConditionScope<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.guard
    }
}

/// 选择器选中的锁
pub enum LockTarget<'a, D> {
    Mutex(&'a Mutex<D>),
    Condition(&'a Condition<D>),
}

impl<'a, D> LockTarget<'a, D> {
    /// 加锁，返回临界区
    pub fn acquire(self) -> LockScope<'a, D> {
        match self {
            LockTarget::Mutex(lock) => LockScope::Mutex(lock.lock()),
            LockTarget::Condition(condition) => LockScope::Condition(condition.enter()),
        }
    }
}

/// 被包装操作看到的临界区
pub enum LockScope<'a, D> {
    Mutex(MutexGuard<'a, D>),
    Condition(ConditionScope<'a, D>),
}

impl<'a, D> LockScope<'a, D> {
    /// 条件变量操作入口
    ///
    /// 普通互斥锁临界区没有条件变量，返回 `MissingPrimitive`。
    pub fn condition(&mut self) -> Result<&mut ConditionScope<'a, D>, DriverError> {
        match self {
            LockScope::Condition(scope) => Ok(scope),
            LockScope::Mutex(_) => Err(DriverError::MissingPrimitive("condition variable")),
        }
    }
}

impl<D> Deref for LockScope<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        match self {
            LockScope::Mutex(guard) => &**guard,
            LockScope::Condition(scope) => &**scope,
        }
    }
}

impl<D> DerefMut for LockScope<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        match self {
            LockScope::Mutex(guard) => &mut **guard,
            LockScope::Condition(scope) => &mut **scope,
        }
    }
}

/// 锁选择器：决定一次调用使用哪把锁
pub trait LockSelector<T: ?Sized> {
    /// 被保护的数据类型
    type Data;

    /// 为目标选择锁；找不到时返回 `None`
    fn select<'a>(&'a self, target: &'a T) -> Option<LockTarget<'a, Self::Data>>;

    /// 选择器期望的原语名称（用于错误信息）
    fn primitive(&self) -> &'static str {
        "mutex"
    }
}

/// 拥有自己互斥锁的对象
pub trait InstanceLocked {
    type Data;

    fn instance_lock(&self) -> Option<&Mutex<Self::Data>>;
}

/// 拥有自己条件变量的对象
pub trait ConditionLocked {
    type Data;

    fn condition(&self) -> Option<&Condition<Self::Data>>;
}

/// 每实例加锁
#[derive(Debug, Clone, Copy, Default)]
pub struct InstanceLock;

impl<T: InstanceLocked + ?Sized> LockSelector<T> for InstanceLock {
    type Data = T::Data;

    fn select<'a>(&'a self, target: &'a T) -> Option<LockTarget<'a, T::Data>> {
        target.instance_lock().map(LockTarget::Mutex)
    }
}

/// 共享锁：所有目标共用同一把互斥锁
#[derive(Debug)]
pub struct SharedLock<D> {
    lock: Arc<Mutex<D>>,
}

impl<D> SharedLock<D> {
    pub fn new(lock: Arc<Mutex<D>>) -> Self {
        Self { lock }
    }

    pub fn lock(&self) -> &Arc<Mutex<D>> {
        &self.lock
    }
}

impl<D> Clone for SharedLock<D> {
    fn clone(&self) -> Self {
        Self {
            lock: Arc::clone(&self.lock),
        }
    }
}

impl<T: ?Sized, D> LockSelector<T> for SharedLock<D> {
    type Data = D;

    fn select<'a>(&'a self, _target: &'a T) -> Option<LockTarget<'a, D>> {
        Some(LockTarget::Mutex(&self.lock))
    }
}

/// 条件变量加锁（复用条件变量自己的互斥锁）
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionLock;

impl<T: ConditionLocked + ?Sized> LockSelector<T> for ConditionLock {
    type Data = T::Data;

    fn select<'a>(&'a self, target: &'a T) -> Option<LockTarget<'a, T::Data>> {
        target.condition().map(LockTarget::Condition)
    }

    fn primitive(&self) -> &'static str {
        "condition variable"
    }
}

/// 锁包装工厂
#[derive(Debug, Clone, Default)]
pub struct LockWrapper<S> {
    selector: S,
}

impl<S> LockWrapper<S> {
    pub const fn new(selector: S) -> Self {
        Self { selector }
    }

    pub fn selector(&self) -> &S {
        &self.selector
    }

    /// 在选中的锁下执行一次 `op`
    pub fn run<T, R>(
        &self,
        target: &T,
        op: impl FnOnce(&mut LockScope<'_, <S as LockSelector<T>>::Data>) -> R,
    ) -> Result<R, DriverError>
    where
        T: ?Sized,
        S: LockSelector<T>,
    {
        let lock = self
            .selector
            .select(target)
            .ok_or_else(|| DriverError::MissingPrimitive(self.selector.primitive()))?;
        let mut scope = lock.acquire();
        Ok(op(&mut scope))
    }

    /// 生成被包装的操作：`(target, arg) -> Result<R, DriverError>`
    pub fn wrap<T, A, R, F>(self, op: F) -> impl Fn(&T, A) -> Result<R, DriverError>
    where
        T: ?Sized,
        S: LockSelector<T>,
        F: Fn(&mut LockScope<'_, <S as LockSelector<T>>::Data>, A) -> R,
    {
        move |target: &T, arg: A| self.run(target, |scope| op(scope, arg))
    }
}
