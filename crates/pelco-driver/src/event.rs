//! 调度循环发布的事件
//!
//! 所有事件带单调时间戳，经 crossbeam 通道分发给监听者。

use crate::query::QueryOutcome;
use pelco_protocol::CommandFrame;
use std::borrow::Cow;
use std::time::Instant;

/// 设备事件
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEvent {
    pub timestamp: Instant,
    pub kind: DeviceEventKind,
}

impl DeviceEvent {
    pub fn now(kind: DeviceEventKind) -> Self {
        Self {
            timestamp: Instant::now(),
            kind,
        }
    }
}

/// 事件类型
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEventKind {
    /// 命令帧已写入串口
    CommandSent {
        frame: CommandFrame,
        label: Cow<'static, str>,
    },
    /// 一次完整查询周期的结果
    AngleResult(QueryOutcome),
    /// 外部跟踪数据更新（由跟踪循环发布）
    TrackingUpdate {
        satellite_id: String,
        azimuth: f64,
        elevation: f64,
        uplink_hz: Option<u64>,
        downlink_hz: Option<u64>,
    },
    /// 非致命错误（本轮迭代失败，循环继续）
    Error { message: String },
    /// 连接状态变化
    ConnectionChanged { connected: bool },
}

impl DeviceEventKind {
    /// 简短名称（用于日志）
    pub fn name(&self) -> &'static str {
        match self {
            DeviceEventKind::CommandSent { .. } => "command-sent",
            DeviceEventKind::AngleResult(_) => "angle-result",
            DeviceEventKind::TrackingUpdate { .. } => "tracking-update",
            DeviceEventKind::Error { .. } => "error",
            DeviceEventKind::ConnectionChanged { .. } => "connection-changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let event = DeviceEvent::now(DeviceEventKind::Error {
            message: "boom".into(),
        });
        assert_eq!(event.kind.name(), "error");
        assert_eq!(
            DeviceEventKind::ConnectionChanged { connected: false }.name(),
            "connection-changed"
        );
    }
}
