//! 带标签的命令帧
//!
//! 调用方为每个帧附带一个标签（如 `"Move Up"`、`"Tracking Set H"`），
//! 调度循环发送后随 `CommandSent` 事件原样发布。

use pelco_protocol::CommandFrame;
use smallvec::SmallVec;
use std::borrow::Cow;

/// 带标签的命令帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledCommand {
    pub frame: CommandFrame,
    pub label: Cow<'static, str>,
}

impl LabeledCommand {
    pub fn new(frame: CommandFrame, label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            frame,
            label: label.into(),
        }
    }
}

/// 一组按顺序入队的命令（跟踪修正固定为 3 帧：停止、水平、垂直）
pub type CommandBurst = SmallVec<[LabeledCommand; 3]>;

#[cfg(test)]
mod tests {
    use super::*;
    use pelco_protocol::{DeviceAddress, stop};

    #[test]
    fn test_labeled_command() {
        let cmd = LabeledCommand::new(stop(DeviceAddress::default()), "Stop");
        assert_eq!(cmd.label, "Stop");
        assert_eq!(cmd.frame.to_hex(), "FF010000000001");

        let owned = LabeledCommand::new(cmd.frame, format!("Stop #{}", 2));
        assert_eq!(owned.label, "Stop #2");
    }

    #[test]
    fn test_burst_stays_inline() {
        let frame = stop(DeviceAddress::default());
        let burst: CommandBurst = (0..3).map(|_| LabeledCommand::new(frame, "Stop")).collect();
        assert!(!burst.spilled());
    }
}
