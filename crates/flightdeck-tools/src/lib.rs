//! # Flightdeck Tools - 飞行分析
//!
//! **依赖原则**: 只依赖 `flightdeck-physics`，不依赖驱动层（无锁、无线程）
//!
//! ## 包含模块
//!
//! - `heading` - 航向差归一化（纯函数）
//! - `phase` - 飞行阶段枚举
//! - `observer` - 飞行观测器：环形历史 + 阶段/机动分析
//!
//! `FlightObserver` 不是线程安全的；需要跨线程共享时由上层加锁
//! （见 `flightdeck-sdk` 的 `SharedFlightObserver`）。

pub mod heading;
pub mod observer;
pub mod phase;

pub use heading::normalize_heading_delta;
pub use observer::{FlightObserver, ManeuverAnalysis};
pub use phase::FlightPhase;
