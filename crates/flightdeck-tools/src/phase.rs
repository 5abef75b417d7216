//! # 飞行阶段

use serde::{Deserialize, Serialize};
use std::fmt;

/// 飞行阶段
///
/// 每次请求时由最新观测重新计算，从不存储。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightPhase {
    /// 尚未飞行
    Idle,
    /// 低空爬升
    Takeoff,
    /// 空中且水平速度接近 0
    Hovering,
    Flying,
    /// 低空下降
    Landing,
    /// 飞行后停在地面
    Landed,
    Crashed,
}

impl FlightPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightPhase::Idle => "idle",
            FlightPhase::Takeoff => "takeoff",
            FlightPhase::Hovering => "hovering",
            FlightPhase::Flying => "flying",
            FlightPhase::Landing => "landing",
            FlightPhase::Landed => "landed",
            FlightPhase::Crashed => "crashed",
        }
    }

    /// 是否在空中
    pub fn is_airborne(&self) -> bool {
        matches!(
            self,
            FlightPhase::Takeoff
                | FlightPhase::Hovering
                | FlightPhase::Flying
                | FlightPhase::Landing
        )
    }

    /// 是否为终态（着陆或坠毁）
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlightPhase::Landed | FlightPhase::Crashed)
    }
}

impl fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
