//! 连接参数与一次性连接流程
//!
//! 每个命令独立执行：读取配置 -> 打开串口 -> 执行操作 -> 断开。

use crate::config::AppConfig;
use crate::validation::{clamp_query_interval, parse_address, validate_baud_rate};
use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::Receiver;
use pelco_driver::{ControllerBuilder, DeviceEvent, DeviceEventKind, Scheduler};
use std::time::{Duration, Instant};

/// 连接参数（命令行参数优先于配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// 串口（如 /dev/ttyUSB0、COM3）
    #[arg(short, long)]
    pub port: Option<String>,

    /// 波特率
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// 设备地址（十六进制，如 0x01）
    #[arg(short, long)]
    pub address: Option<String>,
}

impl ConnectionArgs {
    /// 合并配置文件，得到 Builder
    pub fn builder(&self, config: &AppConfig) -> Result<ControllerBuilder> {
        let port = self
            .port
            .clone()
            .or_else(|| config.port.clone())
            .context("未指定串口（使用 --port 或 `pelco-cli config set --port`）")?;
        let baud_rate = validate_baud_rate(self.baud.unwrap_or(config.baud_rate))?;
        let address = parse_address(self.address.as_deref().unwrap_or(&config.address))?;

        Ok(ControllerBuilder::new()
            .port(port)
            .baud_rate(baud_rate)
            .address(address)
            .vertical_mode(config.vertical_mode)
            .query_interval(Duration::from_millis(clamp_query_interval(
                config.query_interval_ms,
            ))))
    }

    pub fn connect(&self, config: &AppConfig) -> Result<Scheduler> {
        let builder = self.builder(config)?;
        println!("🔌 连接到设备...");
        let scheduler = builder.build().context("打开串口失败")?;
        println!("✅ 已连接（地址 {}）", scheduler.address());
        Ok(scheduler)
    }
}

/// 等待满足条件的事件
pub fn wait_for_event(
    events: &Receiver<DeviceEvent>,
    timeout: Duration,
    pred: impl Fn(&DeviceEventKind) -> bool,
) -> Option<DeviceEvent> {
    let deadline = Instant::now() + timeout;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match events.recv_timeout(remaining) {
            Ok(event) if pred(&event.kind) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
    None
}

/// 等待带指定标签的命令写出
pub fn wait_for_sent(events: &Receiver<DeviceEvent>, label: &str, timeout: Duration) -> Result<()> {
    wait_for_event(events, timeout, |kind| {
        matches!(kind, DeviceEventKind::CommandSent { label: l, .. } if l == label)
    })
    .map(|_| ())
    .with_context(|| format!("命令 '{}' 未在 {:?} 内发出", label, timeout))
}
