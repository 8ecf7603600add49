//! 外部跟踪数据源与轮询循环

use crate::config::{DEFAULT_TRACKING_INTERVAL_MS, clamp_tracking_interval};
use crate::session::{TrackSample, TrackingSession, TrackingStatus};
use crate::sink::CommandSink;
use pelco_driver::{DeviceEvent, DeviceEventKind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 休眠切片（停止请求的最大响应延迟）
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// 一次轮询结果
#[derive(Debug, Clone, PartialEq)]
pub enum TrackPoll {
    /// 新样本
    Sample(TrackSample),
    /// 没有新数据，沿用上一个样本（重新评估，不重复发布和计数）
    Repeat(TrackSample),
    /// 外部源在线，但当前未跟踪任何目标
    NotTracking,
    /// 外部源已结束
    Finished,
}

/// 外部跟踪数据源
pub trait TrackSource {
    fn poll(&mut self) -> TrackPoll;
}

impl<F> TrackSource for F
where
    F: FnMut() -> TrackPoll,
{
    fn poll(&mut self) -> TrackPoll {
        self()
    }
}

/// 运行时可调的轮询间隔（毫秒，限制在 100..=10000）
#[derive(Debug)]
pub struct TrackingInterval(AtomicU64);

impl TrackingInterval {
    pub fn new(ms: u64) -> Self {
        Self(AtomicU64::new(clamp_tracking_interval(ms)))
    }

    pub fn set_ms(&self, ms: u64) {
        self.0.store(clamp_tracking_interval(ms), Ordering::Relaxed);
    }

    pub fn get(&self) -> Duration {
        Duration::from_millis(self.0.load(Ordering::Relaxed))
    }
}

impl Default for TrackingInterval {
    fn default() -> Self {
        Self::new(DEFAULT_TRACKING_INTERVAL_MS)
    }
}

/// 跟踪循环统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackingSummary {
    pub samples: usize,
    pub corrections: usize,
    pub errors: usize,
}

/// 轮询外部源并驱动跟踪会话，直到源结束或 `running` 被清除
///
/// 每个样本都发布 `TrackingUpdate` 事件；处理失败只记录日志，循环继续。
pub fn run_tracking_loop(
    source: &mut impl TrackSource,
    session: &mut TrackingSession,
    sink: &impl CommandSink,
    interval: &TrackingInterval,
    running: &AtomicBool,
) -> TrackingSummary {
    let mut summary = TrackingSummary::default();
    info!("Tracking loop started");

    while running.load(Ordering::Acquire) {
        let update = match source.poll() {
            TrackPoll::Sample(sample) => {
                summary.samples += 1;
                sink.publish(DeviceEvent::now(DeviceEventKind::TrackingUpdate {
                    satellite_id: sample.satellite_id.clone(),
                    azimuth: sample.azimuth,
                    elevation: sample.elevation,
                    uplink_hz: sample.uplink_hz,
                    downlink_hz: sample.downlink_hz,
                }));
                Some(sample)
            },
            TrackPoll::Repeat(sample) => Some(sample),
            TrackPoll::NotTracking => None,
            TrackPoll::Finished => break,
        };

        match session.handle_update(update, sink, Instant::now()) {
            Ok(TrackingStatus::Tracking { sent: true }) => summary.corrections += 1,
            Ok(_) => {},
            Err(e) => {
                summary.errors += 1;
                warn!("Tracking update failed: {}", e);
                sink.publish(DeviceEvent::now(DeviceEventKind::Error {
                    message: format!("tracking update failed: {}", e),
                }));
            },
        }

        sleep_while_running(interval.get(), running);
    }

    info!(
        "Tracking loop finished: {} samples, {} corrections",
        summary.samples, summary.corrections
    );
    summary
}

fn sleep_while_running(duration: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::Acquire) {
        let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
            break;
        };
        spin_sleep::sleep(remaining.min(SLEEP_SLICE));
    }
}
