//! # Flightdeck CLI
//!
//! 仿真核心的外部驱动：按固定步长调用 `advance`，打印飞行阶段与机动分析。
//!
//! ```bash
//! # 起飞、爬升到 60 m 后下降，安全着陆
//! flightdeck-cli simulate --speed 120 --climb 20 --descend-at 60
//!
//! # 按真实时间节拍运行并录制轨迹
//! flightdeck-cli simulate --realtime --record flight.json
//!
//! # 打印默认配置 / 校验配置文件
//! flightdeck-cli config show
//! flightdeck-cli config check sim.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ConfigCommand, SimulateCommand};

/// Flightdeck CLI - 飞行仿真命令行工具
#[derive(Parser, Debug)]
#[command(name = "flightdeck-cli")]
#[command(about = "Command-line driver for the Flightdeck simulator core", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 运行一次仿真飞行
    Simulate {
        #[command(flatten)]
        args: SimulateCommand,
    },

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    // 初始化日志
    let filter = EnvFilter::from_default_env().add_directive("flightdeck_cli=info".parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { args } => args.execute(),

        Commands::Config(cmd) => cmd.execute(),
    }
}
