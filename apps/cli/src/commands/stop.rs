//! 停止命令

use crate::config::AppConfig;
use crate::connection::{ConnectionArgs, wait_for_sent};
use anyhow::Result;
use clap::Args;
use pelco_tracking::ManualControl;
use std::time::Duration;

/// 停止命令参数
#[derive(Args, Debug)]
pub struct StopCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl StopCommand {
    pub fn execute(&self, config: &AppConfig) -> Result<()> {
        let scheduler = self.connection.connect(config)?;
        let events = scheduler.events();

        println!("🛑 发送停止命令...");
        ManualControl::default().stop(&scheduler)?;
        wait_for_sent(&events, "Stop", Duration::from_secs(3))?;
        println!("✅ 停止完成");
        Ok(())
    }
}
