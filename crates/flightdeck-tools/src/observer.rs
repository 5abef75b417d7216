//! # 飞行观测器
//!
//! 维护最近观测到的状态（固定容量环形缓冲），并据此计算飞行阶段与机动摘要。
//!
//! ## 阶段判定（按优先级）
//!
//! | 条件 | 阶段 |
//! |---|---|
//! | 无观测 | `idle` |
//! | `z <= -1` | `crashed` |
//! | `z <= 0` 且曾飞行（`ftime > 0`） | `landed` |
//! | `z <= 0` 且未飞行 | `idle` |
//! | `vz < -descent_threshold` 且 `z < landing_altitude` | `landing` |
//! | `vz > climb_threshold` 且 `z < takeoff_altitude` | `takeoff` |
//! | 水平速度 `< hover_speed` | `hovering` |
//! | 其他 | `flying` |
//!
//! ## 机动标志（最近 `window` 个观测）
//!
//! - 爬升/下降：平均垂直速度超过阈值
//! - 转弯：相邻航向差（归一化后）的平均值绝对值超过阈值
//! - 停滞：窗口首尾的水平位移小于阈值
//!
//! 观测少于 2 个时所有机动标志为 `false`。

use flightdeck_physics::{CRASH_ALTITUDE, ConfigError, FlightState, ObserverConfig};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

use crate::heading::normalize_heading_delta;
use crate::phase::FlightPhase;

/// 机动分析结果（只读，每次 `analyze()` 重新计算）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ManeuverAnalysis {
    pub phase: FlightPhase,
    pub is_ascending: bool,
    pub is_descending: bool,
    pub is_turning: bool,
    pub is_stagnating: bool,
    /// 窗口内平均垂直速度（m/s）
    pub avg_vz: f64,
    /// 窗口内平均航向变化（°/步，正值为右转）
    pub avg_heading_change: f64,
}

impl ManeuverAnalysis {
    fn at_phase(phase: FlightPhase) -> Self {
        Self {
            phase,
            is_ascending: false,
            is_descending: false,
            is_turning: false,
            is_stagnating: false,
            avg_vz: 0.0,
            avg_heading_change: 0.0,
        }
    }

    fn maneuvers(&self) -> Vec<&'static str> {
        let mut parts = Vec::new();
        if self.is_ascending {
            parts.push("ascending");
        }
        if self.is_descending {
            parts.push("descending");
        }
        if self.is_turning {
            parts.push(if self.avg_heading_change > 0.0 {
                "turning right"
            } else {
                "turning left"
            });
        }
        if self.is_stagnating {
            parts.push("stagnating");
        }
        parts
    }
}

impl fmt::Display for ManeuverAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self.maneuvers();
        if parts.is_empty() {
            return write!(f, "{}: steady", self.phase);
        }
        write!(
            f,
            "{}: {} (avg vz {:+.2} m/s, heading {:+.1}°/step)",
            self.phase,
            parts.join(", "),
            self.avg_vz,
            self.avg_heading_change
        )
    }
}

/// 飞行观测器
///
/// 不是线程安全的：设计为单一写者/读者，由外部协调。
#[derive(Debug, Clone)]
pub struct FlightObserver {
    config: ObserverConfig,
    history: VecDeque<FlightState>,
}

impl FlightObserver {
    /// 创建观测器（校验配置）
    pub fn new(config: ObserverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let history = VecDeque::with_capacity(config.history_size);
        Ok(Self { config, history })
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    /// 追加一份状态副本；满时淘汰最旧的
    pub fn observe(&mut self, state: &FlightState) {
        if self.history.len() >= self.config.history_size {
            self.history.pop_front();
        }
        self.history.push_back(*state);
    }

    /// 当前飞行阶段
    pub fn phase(&self) -> FlightPhase {
        let Some(latest) = self.history.back() else {
            return FlightPhase::Idle;
        };
        let c = &self.config;

        if latest.z <= CRASH_ALTITUDE {
            FlightPhase::Crashed
        } else if latest.z <= 0.0 {
            if latest.ftime > 0.0 {
                FlightPhase::Landed
            } else {
                FlightPhase::Idle
            }
        } else if latest.vz < -c.descent_threshold && latest.z < c.landing_altitude {
            FlightPhase::Landing
        } else if latest.vz > c.climb_threshold && latest.z < c.takeoff_altitude {
            FlightPhase::Takeoff
        } else if latest.horizontal_speed() < c.hover_speed {
            FlightPhase::Hovering
        } else {
            FlightPhase::Flying
        }
    }

    /// 阶段与机动分析
    pub fn analyze(&self) -> ManeuverAnalysis {
        let mut analysis = ManeuverAnalysis::at_phase(self.phase());
        if self.history.len() < 2 {
            return analysis;
        }

        let c = &self.config;
        let start = self.history.len().saturating_sub(c.window);
        let window: Vec<&FlightState> = self.history.range(start..).collect();
        let count = window.len() as f64;

        let avg_vz = window.iter().map(|s| s.vz).sum::<f64>() / count;
        let avg_heading_change = window
            .windows(2)
            .map(|pair| normalize_heading_delta(pair[1].d - pair[0].d))
            .sum::<f64>()
            / (count - 1.0);

        let (first, last) = (window[0], window[window.len() - 1]);
        let displacement = (last.x - first.x).hypot(last.y - first.y);

        analysis.avg_vz = avg_vz;
        analysis.avg_heading_change = avg_heading_change;
        analysis.is_ascending = avg_vz > c.climb_threshold;
        analysis.is_descending = avg_vz < -c.descent_threshold;
        analysis.is_turning = avg_heading_change.abs() > c.turn_threshold;
        analysis.is_stagnating = displacement < c.stagnation_distance;
        analysis
    }

    /// 最新分析结果的简短描述
    pub fn get_maneuver_description(&self) -> String {
        self.analyze().to_string()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn latest(&self) -> Option<&FlightState> {
        self.history.back()
    }

    pub fn history(&self) -> impl Iterator<Item = &FlightState> {
        self.history.iter()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}
