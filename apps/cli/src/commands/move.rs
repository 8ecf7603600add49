//! 方向运动命令
//!
//! 运动指定时长后自动发送停止帧。

use crate::config::AppConfig;
use crate::connection::{ConnectionArgs, wait_for_sent};
use anyhow::Result;
use clap::Args;
use pelco_protocol::{DEFAULT_SPEED, Direction};
use pelco_tracking::{ManualControl, TrackingSession};
use std::time::Duration;

/// 等待命令写出的超时
const SEND_TIMEOUT: Duration = Duration::from_secs(3);

/// 方向运动命令参数
#[derive(Args, Debug)]
pub struct MoveCommand {
    /// 方向：up / down / left / right
    pub direction: Direction,

    /// 速度（0-255）
    #[arg(short, long, default_value_t = DEFAULT_SPEED)]
    pub speed: u8,

    /// 运动时长（毫秒），之后自动停止
    #[arg(short = 'd', long, default_value_t = 1000)]
    pub duration_ms: u64,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl MoveCommand {
    pub fn execute(&self, config: &AppConfig) -> Result<()> {
        let scheduler = self.connection.connect(config)?;
        let events = scheduler.events();
        let manual = ManualControl::new(self.speed);

        println!("➡️  向 {} 运动 {} ms...", self.direction.label(), self.duration_ms);
        manual.start_move(&scheduler, &TrackingSession::default(), self.direction)?;
        wait_for_sent(&events, &format!("Move {}", self.direction.label()), SEND_TIMEOUT)?;

        std::thread::sleep(Duration::from_millis(self.duration_ms));

        manual.stop(&scheduler)?;
        wait_for_sent(&events, "Stop", SEND_TIMEOUT)?;
        println!("✅ 已停止");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: MoveCommand,
    }

    #[test]
    fn test_parse_move_args() {
        let cli = TestCli::parse_from(["test", "left", "--speed", "16", "-d", "250", "--port", "COM3"]);
        assert_eq!(cli.args.direction, Direction::Left);
        assert_eq!(cli.args.speed, 16);
        assert_eq!(cli.args.duration_ms, 250);
        assert_eq!(cli.args.connection.port.as_deref(), Some("COM3"));
    }

    #[test]
    fn test_move_defaults() {
        let cli = TestCli::parse_from(["test", "up"]);
        assert_eq!(cli.args.speed, 0x20);
        assert_eq!(cli.args.duration_ms, 1000);
    }
}
