//! 运动学状态记录
//!
//! `FlightState` 是某一瞬间飞行器运动学的不可变快照。
//!
//! # 设计要点
//!
//! - **值类型**: `Copy`，18 个标量字段，整体替换而非原地修改
//! - **复制并覆盖**: 使用结构体更新语法 `FlightState { z: 0.0, ..state }` 派生新记录
//! - **只读视图**: 位置/速度/加速度三维向量由字段派生（`nalgebra::Vector3`）
//!
//! # 不变量（每一步积分之后）
//!
//! - `0 <= v <= vmax`
//! - `inclination_min <= i <= inclination_max`
//! - `0 <= d < 360`
//! - `z >= -1`（`-1` 为坠毁哨兵值）

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// 坠毁哨兵高度（米）
pub const CRASH_ALTITUDE: f64 = -1.0;

/// km/h 与 m/s 的换算系数
pub const KMH_PER_MS: f64 = 3.6;

/// 飞行器运动学状态
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FlightState {
    // === 位置（m） ===
    pub x: f64,
    pub y: f64,
    /// 高度（m），`-1` 表示已坠毁
    pub z: f64,

    // === 速度 ===
    /// 飞行员目标速度（km/h）
    pub v: f64,
    /// 当前速度大小（m/s）
    pub vel: f64,

    // === 姿态 ===
    /// 航向（°），范围 [0, 360)
    pub d: f64,
    /// 倾角（°），正值为爬升
    pub i: f64,

    // === 速度分量（m/s） ===
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,

    // === 加速度分量（m/s²，始终由速度差分得出） ===
    pub ax: f64,
    pub ay: f64,
    pub az: f64,

    /// 累计航程（m）
    pub dist: f64,
    /// 空中时间（s），仅在 `z > 0` 时累加
    pub ftime: f64,

    // === 待执行的速率指令（剩余量，每步按固定步长递减至 0） ===
    /// 速度剩余变化量（km/h）
    pub delta_v: f64,
    /// 航向剩余变化量（°）
    pub delta_d: f64,
    /// 倾角剩余变化量（°）
    pub delta_i: f64,
}

impl FlightState {
    /// 位置向量（只读视图）
    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// 速度向量（只读视图）
    pub fn velocity(&self) -> Vector3<f64> {
        Vector3::new(self.vx, self.vy, self.vz)
    }

    /// 加速度向量（只读视图）
    pub fn acceleration(&self) -> Vector3<f64> {
        Vector3::new(self.ax, self.ay, self.az)
    }

    /// 水平速度大小（m/s）
    pub fn horizontal_speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    /// 是否在空中
    pub fn is_airborne(&self) -> bool {
        self.z > 0.0
    }

    /// 是否已坠毁
    pub fn is_crashed(&self) -> bool {
        self.z <= CRASH_ALTITUDE
    }

    /// 飞行员是否正在下达指令（任一待执行量非零）
    pub fn has_pending_commands(&self) -> bool {
        self.delta_v != 0.0 || self.delta_d != 0.0 || self.delta_i != 0.0
    }

    /// 替换待执行指令，返回新记录
    #[must_use]
    pub fn with_pending(self, delta_v: f64, delta_d: f64, delta_i: f64) -> Self {
        Self {
            delta_v,
            delta_d,
            delta_i,
            ..self
        }
    }

    /// 在现有待执行量上追加一条飞行员指令，返回新记录
    #[must_use]
    pub fn with_command(self, delta_v: f64, delta_d: f64, delta_i: f64) -> Self {
        self.with_pending(
            self.delta_v + delta_v,
            self.delta_d + delta_d,
            self.delta_i + delta_i,
        )
    }
}
