//! 监控命令：持续显示角度和命令事件，Ctrl+C 退出

use crate::config::AppConfig;
use crate::connection::ConnectionArgs;
use crate::validation::parse_query_interval;
use anyhow::Result;
use clap::Args;
use pelco_driver::{DeviceEvent, DeviceEventKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 监控命令参数
#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// 查询间隔（毫秒，50-5000）
    #[arg(short, long)]
    pub interval: Option<String>,

    /// 运行时长（秒），不指定则直到 Ctrl+C
    #[arg(short = 't', long)]
    pub duration: Option<u64>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl MonitorCommand {
    pub fn execute(&self, config: &AppConfig) -> Result<()> {
        let scheduler = self.connection.connect(config)?;
        if let Some(text) = &self.interval {
            let ms = parse_query_interval(text, config.query_interval_ms);
            scheduler.set_query_interval(Duration::from_millis(ms));
        }
        let events = scheduler.events();

        let running = Arc::new(AtomicBool::new(true));
        let running_handler = running.clone();
        ctrlc::set_handler(move || {
            running_handler.store(false, Ordering::Release);
        })?;

        let deadline = self.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
        println!("📡 监控中（Ctrl+C 退出）...");

        while running.load(Ordering::Acquire) && deadline.is_none_or(|d| Instant::now() < d) {
            if let Ok(event) = events.recv_timeout(Duration::from_millis(100)) {
                println!("{}", format_event(&event));
            }
        }

        scheduler.disconnect();
        println!("👋 已断开");
        Ok(())
    }
}

/// 单行事件描述
pub fn format_event(event: &DeviceEvent) -> String {
    match &event.kind {
        DeviceEventKind::CommandSent { frame, label } => format!("TX {}  [{}]", frame, label),
        DeviceEventKind::AngleResult(outcome) => match outcome.sample() {
            Some(sample) => format!(
                "H {:>7.2}°  V {:>7.2}°",
                sample.horizontal_deg, sample.vertical_deg
            ),
            None => {
                let describe = |axis: &pelco_driver::AxisOutcome| match &axis.result {
                    Ok(reading) => format!("{:.2}°", reading.degrees),
                    Err(e) => e.to_string(),
                };
                format!(
                    "query failed: H {} / V {}",
                    describe(&outcome.horizontal),
                    describe(&outcome.vertical)
                )
            },
        },
        DeviceEventKind::TrackingUpdate {
            satellite_id,
            azimuth,
            elevation,
            ..
        } => format!("{} az {:.2}° el {:.2}°", satellite_id, azimuth, elevation),
        DeviceEventKind::Error { message } => format!("⚠️  {}", message),
        DeviceEventKind::ConnectionChanged { connected } => {
            if *connected {
                "🔌 connected".to_string()
            } else {
                "🔌 disconnected".to_string()
            }
        },
    }
}
