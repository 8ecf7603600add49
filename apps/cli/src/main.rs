//! # PELCO-D CLI
//!
//! Command-line interface for PELCO-D antenna positioner control.
//!
//! 每个命令独立执行：读取配置 -> 打开串口 -> 执行操作 -> 断开。
//!
//! ```bash
//! # 配置默认串口和地址
//! pelco-cli config set --port /dev/ttyUSB0 --address 0x01
//!
//! # 查询当前角度
//! pelco-cli query --verbose
//!
//! # 转到指定角度
//! pelco-cli goto 180 -- -10
//!
//! # 跟踪（标准输入：<satellite> <azimuth> <elevation>）
//! predict-feed | pelco-cli track --threshold 0.2
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod connection;
mod validation;

use commands::{
    ConfigCommand, GotoCommand, MonitorCommand, MoveCommand, QueryCommand, StopCommand,
    TrackCommand,
};
use config::AppConfig;

/// PELCO-D CLI - 天线转台命令行工具
#[derive(Parser, Debug)]
#[command(name = "pelco-cli")]
#[command(about = "Command-line interface for PELCO-D antenna positioner control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 列出可用串口
    Ports,

    /// 方向运动
    Move {
        #[command(flatten)]
        args: MoveCommand,
    },

    /// 停止
    Stop {
        #[command(flatten)]
        args: StopCommand,
    },

    /// 转到指定角度
    Goto {
        #[command(flatten)]
        args: GotoCommand,
    },

    /// 查询当前角度
    Query {
        #[command(flatten)]
        args: QueryCommand,
    },

    /// 持续监控角度和命令
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },

    /// 根据标准输入的跟踪数据自动跟踪
    Track {
        #[command(flatten)]
        args: TrackCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pelco_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),
        Commands::Ports => commands::ports::execute(),
        Commands::Move { args } => args.execute(&AppConfig::load()?),
        Commands::Stop { args } => args.execute(&AppConfig::load()?),
        Commands::Goto { args } => args.execute(&AppConfig::load()?),
        Commands::Query { args } => args.execute(&AppConfig::load()?),
        Commands::Monitor { args } => args.execute(&AppConfig::load()?),
        Commands::Track { args } => args.execute(&AppConfig::load()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::parse_from(["pelco-cli", "query", "--verbose", "-p", "COM3"]);
        assert!(matches!(cli.command, Commands::Query { args } if args.verbose));

        let cli = Cli::parse_from(["pelco-cli", "config", "set", "--vertical-mode", "negative"]);
        assert!(matches!(cli.command, Commands::Config(ConfigCommand::Set(_))));

        let cli = Cli::parse_from(["pelco-cli", "track", "--az-delta", "-2.5"]);
        assert!(matches!(
            cli.command,
            Commands::Track { args } if args.az_delta.as_deref() == Some("-2.5")
        ));
    }
}
