//! 跟踪命令
//!
//! 从标准输入读取外部跟踪数据，每行一个样本：
//!
//! ```text
//! <satellite_id> <azimuth> <elevation> [uplink_hz] [downlink_hz]
//! none
//! ```
//!
//! `none` 表示外部源当前未跟踪任何目标。输入结束或 Ctrl+C 时停止跟踪并断开。

use crate::commands::monitor::format_event;
use crate::config::AppConfig;
use crate::connection::{ConnectionArgs, wait_for_event};
use crate::validation::{parse_offset, parse_threshold, parse_tracking_interval};
use anyhow::Result;
use clap::Args;
use crossbeam_channel::{Receiver, TryRecvError};
use pelco_driver::DeviceEventKind;
use pelco_tracking::{
    AngleOffset, ThrottleConfig, TrackPoll, TrackSample, TrackSource, TrackingInterval,
    TrackingSession, parse_number, run_tracking_loop,
};
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::warn;

/// 跟踪命令参数
#[derive(Args, Debug)]
pub struct TrackCommand {
    /// 位置变化阈值（度，> 0）
    #[arg(long)]
    pub threshold: Option<String>,

    /// 方位角偏移（度）
    #[arg(long, allow_hyphen_values = true)]
    pub az_delta: Option<String>,

    /// 俯仰角偏移（度）
    #[arg(long, allow_hyphen_values = true)]
    pub el_delta: Option<String>,

    /// 跟踪数据轮询间隔（毫秒，100-10000）
    #[arg(short, long)]
    pub interval: Option<String>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl TrackCommand {
    /// 合并命令行与配置文件得到节流配置
    fn throttle_config(&self, config: &AppConfig) -> ThrottleConfig {
        let threshold = self
            .threshold
            .as_deref()
            .map(|t| parse_threshold(t, config.threshold_deg))
            .unwrap_or(config.threshold_deg);
        let az_delta = self
            .az_delta
            .as_deref()
            .map(|t| parse_offset("azimuth_delta", t, config.azimuth_delta_deg))
            .unwrap_or(config.azimuth_delta_deg);
        let el_delta = self
            .el_delta
            .as_deref()
            .map(|t| parse_offset("elevation_delta", t, config.elevation_delta_deg))
            .unwrap_or(config.elevation_delta_deg);

        ThrottleConfig::default()
            .with_threshold(threshold)
            .with_offset(AngleOffset::new(az_delta, el_delta))
    }

    fn interval_ms(&self, config: &AppConfig) -> u64 {
        self.interval
            .as_deref()
            .map(|t| parse_tracking_interval(t, config.tracking_interval_ms))
            .unwrap_or(config.tracking_interval_ms)
    }

    pub fn execute(&self, config: &AppConfig) -> Result<()> {
        let throttle = self.throttle_config(config);
        let interval = TrackingInterval::new(self.interval_ms(config));

        let scheduler = self.connection.connect(config)?;
        let events = scheduler.events();

        let running = Arc::new(AtomicBool::new(true));
        let running_handler = running.clone();
        ctrlc::set_handler(move || {
            running_handler.store(false, Ordering::Release);
        })?;

        // 事件打印线程
        let printer_running = running.clone();
        let printer_events = events.clone();
        let printer = thread::spawn(move || {
            while printer_running.load(Ordering::Acquire) {
                if let Ok(event) = printer_events.recv_timeout(Duration::from_millis(100)) {
                    println!("{}", format_event(&event));
                }
            }
        });

        println!(
            "🛰️  跟踪中（阈值 {}°，偏移 az {}° el {}°，间隔 {:?}），从标准输入读取数据...",
            throttle.threshold_deg,
            throttle.offset.azimuth_delta,
            throttle.offset.elevation_delta,
            interval.get()
        );

        let mut session = TrackingSession::new(throttle);
        session.start();
        let mut source = LineTrackSource::spawn_stdin();
        let summary = run_tracking_loop(&mut source, &mut session, &scheduler, &interval, &running);

        if session.is_active()
            && let Err(e) = session.stop(&scheduler)
        {
            warn!("Failed to stop tracking: {}", e);
        }
        running.store(false, Ordering::Release);
        let _ = printer.join();

        scheduler.disconnect();
        wait_for_event(&events, Duration::from_secs(2), |kind| {
            matches!(kind, DeviceEventKind::ConnectionChanged { connected: false })
        });

        println!(
            "✅ 跟踪结束：{} 个样本，{} 次修正，{} 次错误",
            summary.samples, summary.corrections, summary.errors
        );
        Ok(())
    }
}

/// 解析一行跟踪数据
pub fn parse_track_line(line: &str) -> Result<TrackPoll, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [] => Err("empty line".to_string()),
        [flag] if flag.eq_ignore_ascii_case("none") => Ok(TrackPoll::NotTracking),
        [satellite, azimuth, elevation, rest @ ..] if rest.len() <= 2 => {
            let azimuth = parse_number("azimuth", azimuth).map_err(|e| e.to_string())?;
            let elevation = parse_number("elevation", elevation).map_err(|e| e.to_string())?;
            let frequency = |index: usize| -> Result<Option<u64>, String> {
                rest.get(index)
                    .map(|text| text.parse::<u64>().map_err(|_| format!("invalid frequency: '{}'", text)))
                    .transpose()
            };
            Ok(TrackPoll::Sample(TrackSample {
                satellite_id: satellite.to_string(),
                azimuth,
                elevation,
                uplink_hz: frequency(0)?,
                downlink_hz: frequency(1)?,
            }))
        },
        _ => Err(format!("expected '<satellite> <azimuth> <elevation>', got '{}'", line.trim())),
    }
}

/// 按行输入的跟踪数据源
///
/// 读取线程把行送入通道；每次轮询取最新一行。没有新数据时上一个样本以
/// [`TrackPoll::Repeat`] 返回，`none` 状态原样返回。
pub struct LineTrackSource {
    lines: Receiver<String>,
    last: TrackPoll,
}

impl LineTrackSource {
    pub fn new(lines: Receiver<String>) -> Self {
        Self {
            lines,
            last: TrackPoll::NotTracking,
        }
    }

    pub fn spawn_stdin() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self::new(rx)
    }
}

impl TrackSource for LineTrackSource {
    fn poll(&mut self) -> TrackPoll {
        let mut received = false;
        loop {
            match self.lines.try_recv() {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_track_line(&line) {
                        Ok(poll) => {
                            self.last = poll;
                            received = true;
                        },
                        Err(e) => warn!("Ignoring track line: {}", e),
                    }
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !received {
                        return TrackPoll::Finished;
                    }
                    break;
                },
            }
        }
        match &self.last {
            TrackPoll::Sample(sample) if !received => TrackPoll::Repeat(sample.clone()),
            last => last.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track_line() {
        assert_eq!(parse_track_line("none"), Ok(TrackPoll::NotTracking));
        assert_eq!(
            parse_track_line("ISS 123.4 45.6 145800000 437800000"),
            Ok(TrackPoll::Sample(TrackSample {
                satellite_id: "ISS".to_string(),
                azimuth: 123.4,
                elevation: 45.6,
                uplink_hz: Some(145_800_000),
                downlink_hz: Some(437_800_000),
            }))
        );
        assert!(matches!(
            parse_track_line("SO-50 10 -2"),
            Ok(TrackPoll::Sample(TrackSample { elevation, .. })) if elevation == -2.0
        ));
        assert!(parse_track_line("ISS abc 10").is_err());
        assert!(parse_track_line("ISS 10").is_err());
        assert!(parse_track_line("ISS 1 2 3 4 5").is_err());
    }

    #[test]
    fn test_line_source_uses_latest_and_repeats() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut source = LineTrackSource::new(rx);
        assert_eq!(source.poll(), TrackPoll::NotTracking);

        tx.send("ISS 10 20".to_string()).unwrap();
        tx.send("garbage".to_string()).unwrap();
        tx.send("ISS 11 21".to_string()).unwrap();
        let TrackPoll::Sample(sample) = source.poll() else {
            panic!("expected sample");
        };
        assert_eq!(sample.azimuth, 11.0);

        // 没有新行时沿用上次样本，但标记为重复
        assert_eq!(source.poll(), TrackPoll::Repeat(sample));

        tx.send("none".to_string()).unwrap();
        drop(tx);
        assert_eq!(source.poll(), TrackPoll::NotTracking);
        assert_eq!(source.poll(), TrackPoll::Finished);

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut source = LineTrackSource::new(rx);
        tx.send("none".to_string()).unwrap();
        assert_eq!(source.poll(), TrackPoll::NotTracking);
        assert_eq!(source.poll(), TrackPoll::NotTracking);
    }

    #[test]
    fn test_throttle_config_merging() {
        let cmd = TrackCommand {
            threshold: Some("0".to_string()),
            az_delta: Some("-1.5".to_string()),
            el_delta: None,
            interval: Some("50".to_string()),
            connection: ConnectionArgs::default(),
        };
        let config = AppConfig {
            threshold_deg: 0.3,
            elevation_delta_deg: 2.0,
            ..AppConfig::default()
        };
        let throttle = cmd.throttle_config(&config);
        assert_eq!(throttle.threshold_deg, 0.3);
        assert_eq!(throttle.offset, AngleOffset::new(-1.5, 2.0));
        assert_eq!(cmd.interval_ms(&config), 100);
    }
}
