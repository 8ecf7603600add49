//! 命令出口
//!
//! 跟踪与手动控制只产生命令，不直接接触串口；命令经 [`CommandSink`]
//! 进入调度器队列。

use pelco_driver::{CommandBurst, DeviceEvent, DriverError, LabeledCommand, Scheduler};
use pelco_protocol::DeviceAddress;
use tracing::trace;

/// 命令出口
pub trait CommandSink {
    /// 当前设备地址（每次构建命令帧时读取）
    fn address(&self) -> DeviceAddress;

    fn send_command(&self, command: LabeledCommand) -> Result<(), DriverError>;

    /// 按顺序入队整组命令
    fn send_burst(&self, burst: CommandBurst) -> Result<(), DriverError>;

    /// 发布事件（默认丢弃）
    fn publish(&self, _event: DeviceEvent) {}
}

impl CommandSink for Scheduler {
    fn address(&self) -> DeviceAddress {
        Scheduler::address(self)
    }

    fn send_command(&self, command: LabeledCommand) -> Result<(), DriverError> {
        Scheduler::send_command(self, command)
    }

    fn send_burst(&self, burst: CommandBurst) -> Result<(), DriverError> {
        Scheduler::send_burst(self, burst)
    }

    fn publish(&self, event: DeviceEvent) {
        if self.event_sender().try_send(event).is_err() {
            trace!("Event channel unavailable, dropping event");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// 记录所有命令的出口
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) sent: RefCell<Vec<LabeledCommand>>,
        pub(crate) events: RefCell<Vec<DeviceEvent>>,
        pub(crate) disconnected: Cell<bool>,
    }

    impl RecordingSink {
        pub(crate) fn labels(&self) -> Vec<String> {
            self.sent.borrow().iter().map(|c| c.label.to_string()).collect()
        }
    }

    impl CommandSink for RecordingSink {
        fn address(&self) -> DeviceAddress {
            DeviceAddress::default()
        }

        fn send_command(&self, command: LabeledCommand) -> Result<(), DriverError> {
            if self.disconnected.get() {
                return Err(DriverError::NotConnected);
            }
            self.sent.borrow_mut().push(command);
            Ok(())
        }

        fn send_burst(&self, burst: CommandBurst) -> Result<(), DriverError> {
            if self.disconnected.get() {
                return Err(DriverError::NotConnected);
            }
            self.sent.borrow_mut().extend(burst);
            Ok(())
        }

        fn publish(&self, event: DeviceEvent) {
            self.events.borrow_mut().push(event);
        }
    }
}
