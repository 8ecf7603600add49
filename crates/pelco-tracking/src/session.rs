//! 跟踪会话
//!
//! 管理跟踪开关、当前外部目标和节流器。目标落到地平线以下时自动结束跟踪
//! 并下发停止帧。

use crate::TrackingError;
use crate::config::ThrottleConfig;
use crate::sink::CommandSink;
use crate::throttle::{ThrottleDecision, TrackingThrottle};
use pelco_driver::LabeledCommand;
use pelco_protocol::stop;
use std::time::Instant;
use tracing::{debug, info, warn};

/// 外部跟踪数据样本
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackSample {
    pub satellite_id: String,
    pub azimuth: f64,
    pub elevation: f64,
    pub uplink_hz: Option<u64>,
    pub downlink_hz: Option<u64>,
}

impl TrackSample {
    pub fn new(satellite_id: impl Into<String>, azimuth: f64, elevation: f64) -> Self {
        Self {
            satellite_id: satellite_id.into(),
            azimuth,
            elevation,
            uplink_hz: None,
            downlink_hz: None,
        }
    }
}

/// 处理一个样本后的会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    /// 跟踪中；`sent` 表示本次是否下发了修正命令
    Tracking { sent: bool },
    /// 目标落到地平线以下，跟踪已结束
    BelowHorizon,
    /// 未在跟踪
    Idle,
}

/// 跟踪会话
#[derive(Debug, Default)]
pub struct TrackingSession {
    throttle: TrackingThrottle,
    active: bool,
    target: Option<TrackSample>,
}

impl TrackingSession {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            throttle: TrackingThrottle::new(config),
            active: false,
            target: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// 最近一次收到的外部目标（未跟踪时也会更新）
    pub fn target(&self) -> Option<&TrackSample> {
        self.target.as_ref()
    }

    pub fn throttle(&self) -> &TrackingThrottle {
        &self.throttle
    }

    pub fn set_config(&mut self, config: ThrottleConfig) {
        self.throttle.set_config(config);
    }

    /// 开始跟踪，下一个样本视为首个样本
    pub fn start(&mut self) {
        self.throttle.reset();
        self.active = true;
        info!("Tracking started");
    }

    /// 结束跟踪并下发停止帧
    pub fn stop(&mut self, sink: &impl CommandSink) -> Result<(), TrackingError> {
        self.active = false;
        info!("Tracking stopped");
        sink.send_command(LabeledCommand::new(stop(sink.address()), "Tracking Stop"))?;
        Ok(())
    }

    /// 处理一次外部更新；`None` 表示外部源当前未跟踪任何目标
    pub fn handle_update(
        &mut self,
        update: Option<TrackSample>,
        sink: &impl CommandSink,
        now: Instant,
    ) -> Result<TrackingStatus, TrackingError> {
        let Some(sample) = update else {
            self.target = None;
            return Ok(if self.active {
                TrackingStatus::Tracking { sent: false }
            } else {
                TrackingStatus::Idle
            });
        };

        let (azimuth, elevation) = (sample.azimuth, sample.elevation);
        self.target = Some(sample);
        if !self.active {
            return Ok(TrackingStatus::Idle);
        }

        let decision = self
            .throttle
            .evaluate(azimuth, elevation, sink.address(), now)?;
        match decision {
            ThrottleDecision::Send(correction) => {
                sink.send_burst(correction.burst.clone())?;
                self.throttle.commit(&correction, now);
                debug!(
                    "Tracking correction sent: az {:.2}° el {:.2}°",
                    correction.azimuth, correction.elevation
                );
                Ok(TrackingStatus::Tracking { sent: true })
            },
            ThrottleDecision::Unchanged => Ok(TrackingStatus::Tracking { sent: false }),
            ThrottleDecision::Locked => {
                debug!("Tracking correction skipped: command lock active");
                Ok(TrackingStatus::Tracking { sent: false })
            },
            ThrottleDecision::BelowHorizon => {
                warn!(
                    "Target below horizon (el {:.2}°), stopping tracking",
                    elevation
                );
                self.active = false;
                sink.send_command(LabeledCommand::new(
                    stop(sink.address()),
                    "Tracking Stop (below horizon)",
                ))?;
                Ok(TrackingStatus::BelowHorizon)
            },
        }
    }
}
