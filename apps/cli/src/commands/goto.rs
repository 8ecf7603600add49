//! 转到指定角度命令

use crate::config::AppConfig;
use crate::connection::{ConnectionArgs, wait_for_sent};
use anyhow::Result;
use clap::Args;
use pelco_protocol::{DeviceAddress, set_horizontal_angle, set_vertical_angle};
use pelco_tracking::{ManualControl, TrackingSession};
use std::time::Duration;

/// 转到命令参数
#[derive(Args, Debug)]
pub struct GotoCommand {
    /// 方位角（0..=360）
    pub azimuth: f64,

    /// 俯仰角（-90..=90）
    #[arg(allow_negative_numbers = true)]
    pub elevation: f64,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl GotoCommand {
    pub fn execute(&self, config: &AppConfig) -> Result<()> {
        // 连接前先校验角度
        set_horizontal_angle(DeviceAddress::default(), self.azimuth)?;
        set_vertical_angle(DeviceAddress::default(), self.elevation)?;

        let scheduler = self.connection.connect(config)?;
        let events = scheduler.events();

        println!("🎯 转到 方位 {:.2}° 俯仰 {:.2}°", self.azimuth, self.elevation);
        ManualControl::default().goto(
            &scheduler,
            &TrackingSession::default(),
            self.azimuth,
            self.elevation,
        )?;
        wait_for_sent(&events, "Goto Set V", Duration::from_secs(3))?;
        println!("✅ 命令已发送");
        Ok(())
    }
}
