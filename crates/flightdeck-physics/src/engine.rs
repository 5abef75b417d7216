//! 物理引擎
//!
//! 纯函数式积分：`(state, config) -> (new_state, should_continue, landed)`。
//!
//! # 单步流程
//!
//! ```text
//! 输入状态（只读）
//!   │ 1. 空中计时（z > 0 时 ftime += dt）
//!   │ 2. 着陆辅助（低空 + 无飞行员指令时注入修正量）
//!   │ 3. 速率积分（v / d / i 各向目标推进一步）
//!   │ 4. km/h → m/s，累计航程
//!   │ 5. 位置积分（球坐标方向 × 速度 × dt）或静止处理
//!   │ 6. 触地判定（安全着陆 z = 0 / 坠毁 z = -1）
//!   ▼
//! StepOutcome
//! ```
//!
//! 引擎不持有可变状态，输入记录永不修改，因此可以在其他线程读取同一份
//! 状态的同时安全调用。相同的配置与输入总是产生逐位相同的输出。

use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::config::{LandingConfig, PhysicsConfig, SimConfig};
use crate::error::ConfigError;
use crate::state::{CRASH_ALTITUDE, FlightState, KMH_PER_MS};

/// 单步积分结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// 新状态
    pub state: FlightState,
    /// 是否应继续积分（触地或坠毁后为 `false`）
    pub should_continue: bool,
    /// 是否处于着陆（触地/静止于地面）状态
    pub landed: bool,
}

impl StepOutcome {
    /// 积分结束时的触地结果；仍在继续时为 `None`
    ///
    /// 触地后速度已清零，不能再对结果状态调用 [`PhysicsEngine::classify_landing`]，
    /// 这里按坠毁哨兵高度区分。
    pub fn touchdown(&self) -> Option<LandingOutcome> {
        if self.should_continue {
            return None;
        }
        Some(if self.state.is_crashed() {
            LandingOutcome::Crashed
        } else {
            LandingOutcome::Safe
        })
    }
}

/// 触地判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingOutcome {
    /// 安全着陆（z = 0）
    Safe,
    /// 坠毁（z = -1）
    Crashed,
}

/// 物理引擎
#[derive(Debug, Clone)]
pub struct PhysicsEngine {
    physics: PhysicsConfig,
    landing: LandingConfig,
}

impl PhysicsEngine {
    /// 创建物理引擎（校验配置）
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        config.physics.validate()?;
        config.landing.validate(&config.physics)?;
        Ok(Self {
            physics: config.physics.clone(),
            landing: config.landing.clone(),
        })
    }

    /// 积分参数
    pub fn physics(&self) -> &PhysicsConfig {
        &self.physics
    }

    /// 着陆参数
    pub fn landing(&self) -> &LandingConfig {
        &self.landing
    }

    /// 积分一步
    ///
    /// 从不失败，总是返回新状态；输入状态不被修改。
    pub fn integrate_step(&self, state: &FlightState) -> StepOutcome {
        // 坠毁是终态
        if state.is_crashed() {
            return StepOutcome {
                state: *state,
                should_continue: false,
                landed: true,
            };
        }

        let p = &self.physics;
        let was_airborne = state.is_airborne();

        let timed = FlightState {
            ftime: if was_airborne {
                state.ftime + p.dt
            } else {
                state.ftime
            },
            ..*state
        };

        let assisted = self.landing_assistance(timed);
        let rated = self.apply_rates(assisted);

        let vel = rated.v / KMH_PER_MS;
        let rated = FlightState {
            vel,
            dist: rated.dist + vel * p.dt,
            ..rated
        };

        if vel <= p.velocity_epsilon {
            return self.hold_still(rated);
        }

        let moved = self.advance_position(state, rated);

        if moved.z > 0.0 {
            return StepOutcome {
                state: moved,
                should_continue: true,
                landed: false,
            };
        }

        if !was_airborne {
            // 地面滑跑：不穿地
            return StepOutcome {
                state: FlightState {
                    z: 0.0,
                    vz: 0.0,
                    ..moved
                },
                should_continue: true,
                landed: false,
            };
        }

        let outcome = self.classify_landing(&moved);
        let z = match outcome {
            LandingOutcome::Safe => {
                info!(
                    speed_kmh = moved.v,
                    vz = moved.vz,
                    inclination = moved.i,
                    "Touchdown: safe landing"
                );
                0.0
            },
            LandingOutcome::Crashed => {
                warn!(
                    speed_kmh = moved.v,
                    vz = moved.vz,
                    inclination = moved.i,
                    "Touchdown: crashed"
                );
                CRASH_ALTITUDE
            },
        };

        StepOutcome {
            state: FlightState {
                z,
                vel: 0.0,
                v: 0.0,
                vx: 0.0,
                vy: 0.0,
                vz: 0.0,
                ..moved
            },
            should_continue: false,
            landed: true,
        }
    }

    /// 触地判定
    ///
    /// 安全条件（全部满足）：
    /// - 速度 `v <= safe_speed`
    /// - `|vz| <= safe_vertical_speed`
    /// - 倾角在水平的浅下滑容差内，或在任一倾角极限的垂直容差内
    pub fn classify_landing(&self, state: &FlightState) -> LandingOutcome {
        let lc = &self.landing;
        let slow = state.v <= lc.safe_speed;
        let gentle = state.vz.abs() <= lc.safe_vertical_speed;

        if slow && gentle && self.in_safe_attitude(state.i) {
            LandingOutcome::Safe
        } else {
            LandingOutcome::Crashed
        }
    }

    fn in_safe_attitude(&self, inclination: f64) -> bool {
        let lc = &self.landing;
        let p = &self.physics;
        inclination.abs() <= lc.shallow_tolerance
            || (inclination - p.inclination_min).abs() <= lc.vertical_tolerance
            || (inclination - p.inclination_max).abs() <= lc.vertical_tolerance
    }

    /// 着陆辅助
    ///
    /// 仅在低空、仍有前进速度且飞行员没有任何待执行指令时介入：
    /// 减速到安全速度，并把倾角引向最近的安全姿态带（浅下滑或近垂直）。
    fn landing_assistance(&self, state: FlightState) -> FlightState {
        let lc = &self.landing;
        let engaged = state.z > 0.0
            && state.z < lc.detection_height
            && state.v > 0.0
            && !state.has_pending_commands();
        if !engaged {
            return state;
        }

        let delta_v = if state.v > lc.safe_speed {
            lc.safe_speed - state.v
        } else {
            0.0
        };
        let delta_i = self
            .safe_attitude_target(state.i)
            .map_or(0.0, |target| target - state.i);

        if delta_v != 0.0 || delta_i != 0.0 {
            debug!(
                altitude = state.z,
                delta_v, delta_i, "Landing assistance engaged"
            );
        }

        FlightState {
            delta_v,
            delta_i,
            ..state
        }
    }

    /// 最近的安全姿态目标；已在安全带内时返回 `None`
    fn safe_attitude_target(&self, inclination: f64) -> Option<f64> {
        if self.in_safe_attitude(inclination) {
            return None;
        }
        let lc = &self.landing;
        let p = &self.physics;

        let shallow = (-lc.shallow_tolerance / 2.0).clamp(p.inclination_min, p.inclination_max);
        let vertical = p.inclination_min + lc.vertical_tolerance / 2.0;

        if (inclination - shallow).abs() <= (inclination - vertical).abs() {
            Some(shallow)
        } else {
            Some(vertical)
        }
    }

    /// 速率积分：v / d / i 各向目标推进一步
    fn apply_rates(&self, state: FlightState) -> FlightState {
        let p = &self.physics;

        let (dv, delta_v) = step_toward(state.delta_v, p.speed_step);
        let (dd, delta_d) = step_toward(state.delta_d, p.heading_step);
        let (di, delta_i) = step_toward(state.delta_i, p.inclination_step);

        FlightState {
            v: (state.v + dv).clamp(0.0, p.vmax),
            d: wrap_heading(state.d + dd, p.direction_modulus),
            i: (state.i + di).clamp(p.inclination_min, p.inclination_max),
            delta_v,
            delta_d,
            delta_i,
            ..state
        }
    }

    /// 按当前姿态与速度推进位置
    ///
    /// `previous` 为本步输入状态，用于加速度差分；从静止起步时加速度为 0。
    fn advance_position(&self, previous: &FlightState, rated: FlightState) -> FlightState {
        let dt = self.physics.dt;
        let velocity = direction(rated.i, rated.d) * rated.vel;

        let last_velocity = previous.velocity();
        let acceleration = if last_velocity == Vector3::zeros() {
            Vector3::zeros()
        } else {
            (velocity - last_velocity) / dt
        };

        let position = previous.position() + velocity * dt;

        FlightState {
            x: position.x,
            y: position.y,
            z: position.z,
            vx: velocity.x,
            vy: velocity.y,
            vz: velocity.z,
            ax: acceleration.x,
            ay: acceleration.y,
            az: acceleration.z,
            ..rated
        }
    }

    /// 静止处理：速度/加速度清零，贴近地面时吸附到 z = 0
    fn hold_still(&self, rated: FlightState) -> StepOutcome {
        let still = FlightState {
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            ax: 0.0,
            ay: 0.0,
            az: 0.0,
            ..rated
        };

        if still.z.abs() <= self.physics.touchdown_epsilon {
            return StepOutcome {
                state: FlightState {
                    z: 0.0,
                    vel: 0.0,
                    v: 0.0,
                    ..still
                },
                should_continue: true,
                landed: true,
            };
        }

        StepOutcome {
            state: still,
            should_continue: true,
            landed: false,
        }
    }
}

/// 向待执行量推进一步
///
/// 返回 `(本步变化量, 剩余量)`；剩余量保持原符号，不会越过 0。
fn step_toward(pending: f64, rate: f64) -> (f64, f64) {
    if pending.abs() <= rate {
        (pending, 0.0)
    } else {
        let change = rate.copysign(pending);
        (change, pending - change)
    }
}

/// 单位方向向量（航向 0° 指向 +y，90° 指向 +x；倾角向上为正）
fn direction(inclination_deg: f64, heading_deg: f64) -> Vector3<f64> {
    let (sin_i, cos_i) = inclination_deg.to_radians().sin_cos();
    let (sin_d, cos_d) = heading_deg.to_radians().sin_cos();
    Vector3::new(cos_i * sin_d, cos_i * cos_d, sin_i)
}

/// 把航向回绕到 `[0, modulus)`
pub fn wrap_heading(heading: f64, modulus: f64) -> f64 {
    let wrapped = heading.rem_euclid(modulus);
    // rem_euclid 对极小负数可能舍入为 modulus
    if wrapped >= modulus { 0.0 } else { wrapped }
}
