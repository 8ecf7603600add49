//! # PELCO-D Tracking
//!
//! 跟踪与手动控制层，只产生命令帧，经 [`CommandSink`]（通常是
//! `pelco_driver::Scheduler`）入队，不直接访问串口。
//!
//! - `throttle`: 位置变化阈值 + 命令锁定
//! - `session`: 跟踪开关、地平线处理
//! - `manual`: 方向运动、停止、转到
//! - `source`: 外部跟踪数据源与轮询循环

pub mod config;
pub mod manual;
pub mod session;
pub mod sink;
pub mod source;
pub mod throttle;

pub use config::{AngleOffset, ThrottleConfig, parse_number};
pub use manual::ManualControl;
pub use session::{TrackSample, TrackingSession, TrackingStatus};
pub use sink::CommandSink;
pub use source::{TrackPoll, TrackSource, TrackingInterval, TrackingSummary, run_tracking_loop};
pub use throttle::{Correction, ThrottleDecision, TrackingState, TrackingThrottle};

use pelco_driver::DriverError;
use pelco_protocol::ProtocolError;
use thiserror::Error;

/// 数值参数解析错误（调用方回退到默认值，不中断跟踪）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigParseError {
    #[error("invalid number for {field}: '{input}'")]
    InvalidNumber { field: &'static str, input: String },

    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },
}

/// 跟踪层错误
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 跟踪进行中，手动运动被拒绝
    #[error("Manual control is disabled while tracking is active")]
    TrackingActive,
}
