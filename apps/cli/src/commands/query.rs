//! 角度查询命令

use crate::config::AppConfig;
use crate::connection::{ConnectionArgs, wait_for_event};
use anyhow::{Context, Result, bail};
use clap::Args;
use pelco_driver::{AxisOutcome, DeviceEventKind, QueryOutcome};
use pelco_protocol::classify_vertical_raw;
use serde::Serialize;
use std::time::Duration;

/// 一个查询周期的最长时间（默认参数下约 2.15s）
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// 角度查询命令参数
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// 显示收发字节和垂直原始值分区
    #[arg(short, long)]
    pub verbose: bool,

    /// 以 JSON 输出
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// JSON 输出
#[derive(Debug, Serialize)]
struct AxisReport {
    degrees: Option<f64>,
    raw: Option<u16>,
    attempts: u32,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct QueryReport {
    address: String,
    vertical_mode: String,
    success: bool,
    horizontal: AxisReport,
    vertical: AxisReport,
}

impl From<&AxisOutcome> for AxisReport {
    fn from(outcome: &AxisOutcome) -> Self {
        Self {
            degrees: outcome.degrees(),
            raw: outcome.reading().map(|r| r.raw),
            attempts: outcome.attempts,
            error: outcome.result.as_ref().err().map(|e| e.to_string()),
        }
    }
}

impl From<&QueryOutcome> for QueryReport {
    fn from(outcome: &QueryOutcome) -> Self {
        Self {
            address: outcome.device_address.to_string(),
            vertical_mode: outcome.vertical_mode.to_string(),
            success: outcome.is_success(),
            horizontal: AxisReport::from(&outcome.horizontal),
            vertical: AxisReport::from(&outcome.vertical),
        }
    }
}

impl QueryCommand {
    pub fn execute(&self, config: &AppConfig) -> Result<()> {
        let scheduler = self.connection.connect(config)?;
        let events = scheduler.events();

        println!("⏳ 正在查询角度...");
        let event = wait_for_event(&events, QUERY_TIMEOUT, |kind| {
            matches!(kind, DeviceEventKind::AngleResult(_))
        })
        .context("查询未在规定时间内完成")?;
        let DeviceEventKind::AngleResult(outcome) = event.kind else {
            bail!("意外的事件类型");
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&QueryReport::from(&outcome))?);
        } else {
            print_outcome(&outcome, self.verbose);
        }

        if !outcome.is_success() {
            bail!("角度查询失败");
        }
        Ok(())
    }
}

fn print_outcome(outcome: &QueryOutcome, verbose: bool) {
    if verbose {
        print!("{}", outcome);
        if let Some(reading) = outcome.vertical.reading() {
            let repr = classify_vertical_raw(reading.raw);
            println!(
                "  vertical raw {} -> {}: direct {:.2}°, negative {:.2}°",
                repr.raw, repr.class, repr.direct_deg, repr.negative_deg
            );
        }
        return;
    }

    println!("📊 角度（地址 {}，模式 {}）:", outcome.device_address, outcome.vertical_mode);
    for axis in [&outcome.horizontal, &outcome.vertical] {
        match &axis.result {
            Ok(reading) => println!("  {:<10} {:>8.2}°", axis.axis, reading.degrees),
            Err(e) => println!("  {:<10} ❌ {}", axis.axis, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pelco_driver::{AttemptFailure, AxisFailure, AxisReading};
    use pelco_protocol::{Axis, DeviceAddress, VerticalAngleMode};
    use std::time::Instant;

    #[test]
    fn test_report_serialization() {
        let outcome = QueryOutcome {
            device_address: DeviceAddress::default(),
            vertical_mode: VerticalAngleMode::Auto,
            horizontal: AxisOutcome {
                axis: Axis::Horizontal,
                result: Ok(AxisReading {
                    degrees: 12.5,
                    raw: 1250,
                }),
                attempts: 1,
                tx: Vec::new(),
                rx: Vec::new(),
            },
            vertical: AxisOutcome {
                axis: Axis::Vertical,
                result: Err(AxisFailure::Exhausted {
                    attempts: 3,
                    last: AttemptFailure::TimedOut { received: 0 },
                }),
                attempts: 3,
                tx: Vec::new(),
                rx: Vec::new(),
            },
            completed_at: Instant::now(),
        };

        let json = serde_json::to_value(QueryReport::from(&outcome)).unwrap();
        assert_eq!(json["address"], "0x01");
        assert_eq!(json["vertical_mode"], "auto");
        assert_eq!(json["success"], false);
        assert_eq!(json["horizontal"]["raw"], 1250);
        assert!(json["vertical"]["degrees"].is_null());
        assert!(
            json["vertical"]["error"]
                .as_str()
                .unwrap()
                .contains("exhausted")
        );
    }
}
