//! 线程安全的飞行观测器
//!
//! [`FlightObserver`] 本身不加锁。`SharedFlightObserver` 用条件变量锁包装它，
//! 使其可以注册为 [`StateManager`](flightdeck_driver::StateManager) 的观察者，
//! 同时供其他线程查询分析结果或阻塞等待某个飞行阶段。
//!
//! `observe` 在临界区内发出信号（复用条件变量自己的互斥锁），
//! 等待者在同一把锁上被唤醒后重新判定阶段。

use flightdeck_driver::{
    CallbackError, Condition, ConditionLock, ConditionLocked, DriverError, LockWrapper,
    StateCallback,
};
use flightdeck_physics::{ConfigError, FlightState, ObserverConfig};
use flightdeck_tools::{FlightObserver, FlightPhase, ManeuverAnalysis};
use std::time::{Duration, Instant};
use tracing::debug;

const LOCKED: LockWrapper<ConditionLock> = LockWrapper::new(ConditionLock);

/// 线程安全的飞行观测器
pub struct SharedFlightObserver {
    inner: Condition<FlightObserver>,
}

impl ConditionLocked for SharedFlightObserver {
    type Data = FlightObserver;

    fn condition(&self) -> Option<&Condition<FlightObserver>> {
        Some(&self.inner)
    }
}

impl SharedFlightObserver {
    pub fn new(config: ObserverConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_observer(FlightObserver::new(config)?))
    }

    pub fn from_observer(observer: FlightObserver) -> Self {
        Self {
            inner: Condition::new(observer),
        }
    }

    /// 追加观测并唤醒所有等待者
    pub fn observe(&self, state: &FlightState) -> Result<(), DriverError> {
        LOCKED.run(self, |scope| {
            let before = scope.phase();
            scope.observe(state);
            let after = scope.phase();
            if before != after {
                debug!(from = %before, to = %after, "Flight phase changed");
            }
            scope.condition().map(|cond| {
                cond.notify_all();
            })
        })?
    }

    pub fn analyze(&self) -> Result<ManeuverAnalysis, DriverError> {
        LOCKED.run(self, |scope| scope.analyze())
    }

    pub fn phase(&self) -> Result<FlightPhase, DriverError> {
        LOCKED.run(self, |scope| scope.phase())
    }

    pub fn get_maneuver_description(&self) -> Result<String, DriverError> {
        LOCKED.run(self, |scope| scope.get_maneuver_description())
    }

    pub fn len(&self) -> Result<usize, DriverError> {
        LOCKED.run(self, |scope| scope.len())
    }

    pub fn is_empty(&self) -> Result<bool, DriverError> {
        LOCKED.run(self, |scope| scope.is_empty())
    }

    pub fn clear(&self) -> Result<(), DriverError> {
        LOCKED.run(self, |scope| scope.clear())
    }

    /// 观测器当前内容的副本
    pub fn snapshot(&self) -> Result<FlightObserver, DriverError> {
        LOCKED.run(self, |scope| (**scope).clone())
    }

    /// 阻塞直到观测到的阶段等于 `phase`
    ///
    /// `timeout = None` 无限等待；超时返回 `Ok(false)`。
    pub fn wait_for_phase(
        &self,
        phase: FlightPhase,
        timeout: Option<Duration>,
    ) -> Result<bool, DriverError> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        LOCKED.run(self, |scope| {
            let cond = scope.condition()?;
            loop {
                if cond.phase() == phase {
                    return Ok(true);
                }
                match deadline {
                    Some(deadline) => {
                        if Instant::now() >= deadline {
                            return Ok(false);
                        }
                        cond.wait_until(deadline);
                    },
                    None => cond.wait(),
                }
            }
        })?
    }
}

impl StateCallback for SharedFlightObserver {
    fn on_state_changed(&self, state: &FlightState) -> Result<(), CallbackError> {
        self.observe(state).map_err(|e| CallbackError::new(e.to_string()))
    }
}
