//! # Flightdeck Physics
//!
//! 飞行器运动学状态与确定性积分引擎（无线程依赖）
//!
//! ## 模块
//!
//! - `state`: 运动学状态记录（不可变值类型，整体替换）
//! - `config`: 仿真配置（TOML 加载 + 一次性校验）
//! - `engine`: 物理引擎（纯函数：状态 → 新状态）
//! - `error`: 配置错误类型
//!
//! ## 单位约定
//!
//! - 位置、距离：米（m）
//! - `v`：飞行员目标速度（km/h）；`vel` 及速度分量：m/s
//! - 航向 `d`、倾角 `i`：度（°）

pub mod config;
pub mod engine;
pub mod error;
pub mod state;

// 重新导出常用类型
pub use config::{LandingConfig, ObserverConfig, PhysicsConfig, SimConfig};
pub use engine::{LandingOutcome, PhysicsEngine, StepOutcome, wrap_heading};
pub use error::ConfigError;
pub use state::{CRASH_ALTITUDE, FlightState, KMH_PER_MS};
