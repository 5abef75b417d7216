//! 配置错误类型定义

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 配置错误
///
/// 仅在配置构造/加载时产生一次，积分过程中不会重复校验。
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 必须为有限正数的参数
    #[error("{field} must be a finite positive number, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    /// 必须为非负有限数的参数
    #[error("{field} must be a finite non-negative number, got {value}")]
    Negative { field: &'static str, value: f64 },

    /// 区间上下界无效
    #[error("Invalid range for {field}: [{min}, {max}]")]
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
    },

    /// 观测窗口与历史容量不匹配
    #[error("Observer window ({window}) must be within 2..={history_size}")]
    InvalidWindow { window: usize, history_size: usize },

    /// 读取配置文件失败
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// TOML 解析失败
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML 序列化失败
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::ConfigError;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::NonPositive {
            field: "physics.dt",
            value: 0.0,
        };
        assert_eq!(
            err.to_string(),
            "physics.dt must be a finite positive number, got 0"
        );

        let err = ConfigError::InvalidRange {
            field: "physics.inclination",
            min: 10.0,
            max: -10.0,
        };
        assert!(err.to_string().contains("physics.inclination"));

        let err = ConfigError::InvalidWindow {
            window: 20,
            history_size: 10,
        };
        assert!(err.to_string().contains("2..=10"));
    }

    #[test]
    fn test_from_toml_error() {
        let parse_err = toml::from_str::<toml::Table>("= broken").unwrap_err();
        let err: ConfigError = parse_err.into();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
