//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use flightdeck_sdk::prelude::*;
//! ```

// 物理层
pub use crate::physics::{
    FlightState, LandingConfig, ObserverConfig, PhysicsConfig, PhysicsEngine, SimConfig,
    StepOutcome,
};

// 驱动层
pub use crate::driver::{FnCallback, SnapshotRecorder, StateCallback, StateManager};

// 工具层
pub use crate::tools::{FlightObserver, FlightPhase, ManeuverAnalysis};

pub use crate::observer::SharedFlightObserver;

// 错误类型
pub use crate::driver::{CallbackError, DriverError};
pub use crate::physics::ConfigError;
