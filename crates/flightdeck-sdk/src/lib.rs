//! Flightdeck SDK - 飞行仿真核心
//!
//! 面向控制回路教学的飞行仿真核心：状态管理、物理积分、飞行观测。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **物理层** (`physics`): 状态记录、配置、纯函数积分
//! - **驱动层** (`driver`): 锁包装原语、状态管理器、观察者钩子
//! - **工具层** (`tools`): 飞行阶段与机动分析
//!
//! # 快速开始
//!
//! ```rust
//! use flightdeck_sdk::prelude::*;
//! use std::sync::Arc;
//!
//! let config = SimConfig::default();
//! let engine = PhysicsEngine::new(&config)?;
//! let manager = StateManager::new();
//! let observer = Arc::new(SharedFlightObserver::new(config.observer.clone())?);
//! manager.register_observer(observer.clone());
//!
//! manager.update_state(|s| s.with_command(120.0, 0.0, 10.0));
//! for _ in 0..100 {
//!     if !manager.advance(&engine).should_continue {
//!         break;
//!     }
//! }
//!
//! println!("{}", observer.get_maneuver_description()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod observer;
pub mod prelude;

pub use flightdeck_driver as driver;
pub use flightdeck_physics as physics;
pub use flightdeck_tools as tools;

// --- 用户以此为界 ---
// 以下是通过 Facade Pattern 提供的公共 API

// 物理层
pub use flightdeck_physics::{
    ConfigError, FlightState, LandingOutcome, PhysicsEngine, SimConfig, StepOutcome,
};

// 驱动层
pub use flightdeck_driver::{
    CallbackError, DriverError, FnCallback, SnapshotRecorder, StateCallback, StateManager,
};

// 工具层
pub use flightdeck_tools::{FlightObserver, FlightPhase, ManeuverAnalysis};

pub use observer::SharedFlightObserver;

/// 初始化日志
///
/// 安装 `tracing-subscriber` fmt 订阅器，过滤规则取自 `RUST_LOG`（默认 `info`）。
/// 重复调用无副作用；已有全局订阅器时返回 `false`。
pub fn init_logging() -> bool {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok()
}
