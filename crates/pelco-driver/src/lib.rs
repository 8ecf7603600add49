//! # PELCO-D Driver
//!
//! 设备驱动层，负责：
//! - 角度查询状态机（超时、重试、校验）
//! - IO 调度循环（命令发送与周期查询在同一线程上互斥执行）
//! - 事件发布（crossbeam 通道）
//!
//! 大多数调用方通过 [`ControllerBuilder`] 创建 [`Scheduler`]，
//! 用 `pelco_protocol` 构建命令帧并经 [`Scheduler::send_frame`] 入队。

mod builder;
pub mod command;
mod error;
pub mod event;
pub mod query;
pub mod scheduler;

pub use builder::ControllerBuilder;
pub use command::{CommandBurst, LabeledCommand};
pub use error::DriverError;
pub use event::{DeviceEvent, DeviceEventKind};
pub use query::{
    AngleSample, AttemptFailure, AxisFailure, AxisOutcome, AxisReading, AxisState, QueryConfig,
    QueryEngine, QueryOutcome,
};
pub use scheduler::{Scheduler, SchedulerConfig};
