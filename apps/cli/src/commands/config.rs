//! 配置管理命令
//!
//! 打印默认仿真配置，或校验一个 TOML 配置文件。

use anyhow::{Context, Result};
use clap::Subcommand;
use flightdeck_sdk::SimConfig;
use std::path::{Path, PathBuf};

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 以 TOML 打印默认配置
    Show,

    /// 校验配置文件
    Check {
        /// 配置文件路径
        file: PathBuf,
    },
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Show => {
                print!("{}", default_toml()?);
                Ok(())
            },

            ConfigCommand::Check { file } => {
                let config = check_file(&file)?;
                println!("✅ {} is valid", file.display());
                println!(
                    "   dt = {} s, vmax = {} km/h, observer window = {}",
                    config.physics.dt, config.physics.vmax, config.observer.window
                );
                Ok(())
            },
        }
    }
}

fn default_toml() -> Result<String> {
    SimConfig::default()
        .to_toml_string()
        .context("failed to render default configuration")
}

fn check_file(path: &Path) -> Result<SimConfig> {
    SimConfig::load_from_file(path)
        .with_context(|| format!("configuration {} is invalid", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_toml_round_trips() {
        let rendered = default_toml().unwrap();
        assert!(rendered.contains("[physics]"));
        assert_eq!(SimConfig::from_toml_str(&rendered).unwrap(), SimConfig::default());
    }

    #[test]
    fn test_check_accepts_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.toml");
        fs::write(&path, "[physics]\ndt = 0.05\n").unwrap();

        let config = check_file(&path).unwrap();
        assert_eq!(config.physics.dt, 0.05);
    }

    #[test]
    fn test_check_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[physics]\ndt = -1.0\n").unwrap();

        let err = check_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("physics.dt"));
    }

    #[test]
    fn test_check_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_file(&dir.path().join("missing.toml")).is_err());
    }
}
