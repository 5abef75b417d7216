//! # 仿真配置
//!
//! 物理引擎与飞行观测器的只读参数。配置在构造时校验一次，之后不再修改。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// 仿真配置（顶层）
///
/// TOML 示例：
///
/// ```toml
/// [physics]
/// dt = 0.1
/// vmax = 300.0
///
/// [landing]
/// safe_speed = 10.0
///
/// [observer]
/// window = 10
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// 运动学积分参数
    pub physics: PhysicsConfig,

    /// 着陆辅助与着陆判定参数
    pub landing: LandingConfig,

    /// 飞行观测器参数
    pub observer: ObserverConfig,
}

impl SimConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载并校验
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 校验全部参数
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.physics.validate()?;
        self.landing.validate(&self.physics)?;
        self.observer.validate()
    }
}

/// 运动学积分参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// 积分步长（s）
    pub dt: f64,

    /// 最大速度（km/h）
    pub vmax: f64,

    /// 每步速度变化量（km/h）
    pub speed_step: f64,

    /// 每步航向变化量（°）
    pub heading_step: f64,

    /// 每步倾角变化量（°）
    pub inclination_step: f64,

    /// 倾角下限（°）
    pub inclination_min: f64,

    /// 倾角上限（°）
    pub inclination_max: f64,

    /// 航向回绕模数（°）
    pub direction_modulus: f64,

    /// 静止判定阈值（m/s）
    pub velocity_epsilon: f64,

    /// 静止触地吸附距离（m）
    pub touchdown_epsilon: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            dt: 0.1,
            vmax: 300.0,
            speed_step: 2.0,
            heading_step: 3.0,
            inclination_step: 1.0,
            inclination_min: -90.0,
            inclination_max: 90.0,
            direction_modulus: 360.0,
            velocity_epsilon: 1e-3,
            touchdown_epsilon: 0.01,
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("physics.dt", self.dt)?;
        positive("physics.vmax", self.vmax)?;
        positive("physics.speed_step", self.speed_step)?;
        positive("physics.heading_step", self.heading_step)?;
        positive("physics.inclination_step", self.inclination_step)?;
        positive("physics.direction_modulus", self.direction_modulus)?;
        non_negative("physics.velocity_epsilon", self.velocity_epsilon)?;
        non_negative("physics.touchdown_epsilon", self.touchdown_epsilon)?;

        let (min, max) = (self.inclination_min, self.inclination_max);
        let in_bounds = |a: f64| (-90.0..=90.0).contains(&a);
        if !(in_bounds(min) && in_bounds(max) && min < max) {
            return Err(ConfigError::InvalidRange {
                field: "physics.inclination",
                min,
                max,
            });
        }
        Ok(())
    }
}

/// 着陆辅助与着陆判定参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandingConfig {
    /// 着陆辅助介入高度（m）
    pub detection_height: f64,

    /// 安全触地速度上限（km/h）
    pub safe_speed: f64,

    /// 安全触地垂直速度上限（m/s）
    pub safe_vertical_speed: f64,

    /// 浅下滑姿态容差（°，相对水平）
    pub shallow_tolerance: f64,

    /// 垂直姿态容差（°，相对倾角极限）
    pub vertical_tolerance: f64,
}

impl Default for LandingConfig {
    fn default() -> Self {
        Self {
            detection_height: 10.0,
            safe_speed: 10.0,
            safe_vertical_speed: 3.0,
            shallow_tolerance: 10.0,
            vertical_tolerance: 5.0,
        }
    }
}

impl LandingConfig {
    pub fn validate(&self, physics: &PhysicsConfig) -> Result<(), ConfigError> {
        non_negative("landing.detection_height", self.detection_height)?;
        non_negative("landing.safe_speed", self.safe_speed)?;
        non_negative("landing.safe_vertical_speed", self.safe_vertical_speed)?;
        non_negative("landing.shallow_tolerance", self.shallow_tolerance)?;
        non_negative("landing.vertical_tolerance", self.vertical_tolerance)?;

        if self.safe_speed > physics.vmax {
            return Err(ConfigError::InvalidRange {
                field: "landing.safe_speed",
                min: self.safe_speed,
                max: physics.vmax,
            });
        }
        Ok(())
    }
}

/// 飞行观测器参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// 历史环形缓冲容量
    pub history_size: usize,

    /// 机动分析窗口（最近 N 个状态）
    pub window: usize,

    /// 爬升判定阈值（m/s）
    pub climb_threshold: f64,

    /// 下降判定阈值（m/s，取绝对值）
    pub descent_threshold: f64,

    /// 转弯判定阈值（°/步）
    pub turn_threshold: f64,

    /// 停滞判定的最小水平位移（m）
    pub stagnation_distance: f64,

    /// 悬停判定的水平速度上限（m/s）
    pub hover_speed: f64,

    /// 起飞阶段高度上限（m）
    pub takeoff_altitude: f64,

    /// 着陆阶段高度上限（m）
    pub landing_altitude: f64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            history_size: 256,
            window: 10,
            climb_threshold: 0.5,
            descent_threshold: 0.5,
            turn_threshold: 0.5,
            stagnation_distance: 1.0,
            hover_speed: 0.5,
            takeoff_altitude: 15.0,
            landing_altitude: 15.0,
        }
    }
}

impl ObserverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window < 2 || self.window > self.history_size {
            return Err(ConfigError::InvalidWindow {
                window: self.window,
                history_size: self.history_size,
            });
        }
        non_negative("observer.climb_threshold", self.climb_threshold)?;
        non_negative("observer.descent_threshold", self.descent_threshold)?;
        non_negative("observer.turn_threshold", self.turn_threshold)?;
        non_negative("observer.stagnation_distance", self.stagnation_distance)?;
        non_negative("observer.hover_speed", self.hover_speed)?;
        non_negative("observer.takeoff_altitude", self.takeoff_altitude)?;
        non_negative("observer.landing_altitude", self.landing_altitude)
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = SimConfig::from_toml_str(
            r#"
            [physics]
            dt = 0.05

            [observer]
            window = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.physics.dt, 0.05);
        assert_eq!(config.physics.vmax, 300.0);
        assert_eq!(config.observer.window, 4);
        assert_eq!(config.landing, LandingConfig::default());
    }

    #[test]
    fn test_rejects_non_positive_dt() {
        let err = SimConfig::from_toml_str("[physics]\ndt = 0.0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NonPositive {
                field: "physics.dt",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_nan() {
        let config = PhysicsConfig {
            vmax: f64::NAN,
            ..PhysicsConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_inclination_bounds() {
        let config = PhysicsConfig {
            inclination_min: 30.0,
            inclination_max: -30.0,
            ..PhysicsConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange { .. })
        ));

        let config = PhysicsConfig {
            inclination_max: 120.0,
            ..PhysicsConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_safe_speed_above_vmax() {
        let config = SimConfig {
            landing: LandingConfig {
                safe_speed: 500.0,
                ..LandingConfig::default()
            },
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_window() {
        for (window, history_size) in [(1, 10), (11, 10), (0, 0)] {
            let config = ObserverConfig {
                window,
                history_size,
                ..ObserverConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidWindow { .. })),
                "window={window} history_size={history_size}"
            );
        }
    }

    #[test]
    fn test_toml_round_trip_preserves_values() {
        let mut config = SimConfig::default();
        config.physics.dt = 0.02;
        config.observer.turn_threshold = 2.5;

        let text = config.to_toml_string().unwrap();
        let parsed = SimConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[landing]\nsafe_speed = 12.5").unwrap();

        let config = SimConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.landing.safe_speed, 12.5);
    }

    #[test]
    fn test_load_missing_file() {
        let err = SimConfig::load_from_file("/nonexistent/flightdeck.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
