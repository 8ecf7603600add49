//! Builder 模式实现
//!
//! 提供链式构造 [`Scheduler`] 实例的便捷方式。

use crate::error::DriverError;
use crate::query::QueryConfig;
use crate::scheduler::{Scheduler, SchedulerConfig};
use pelco_protocol::{DeviceAddress, VerticalAngleMode};
use pelco_serial::{DEFAULT_BAUD_RATE, SerialTransport, Transport};
use std::time::Duration;
use tracing::info;

/// 控制器 Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use pelco_driver::ControllerBuilder;
/// use pelco_protocol::{DeviceAddress, VerticalAngleMode};
///
/// let scheduler = ControllerBuilder::new()
///     .port("/dev/ttyUSB0")
///     .baud_rate(9600)
///     .address(DeviceAddress::new(0x01).unwrap())
///     .vertical_mode(VerticalAngleMode::Negative)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ControllerBuilder {
    /// 串口名称（如 `/dev/ttyUSB0`、`COM3`）
    port: Option<String>,
    baud_rate: Option<u32>,
    query_config: QueryConfig,
    scheduler_config: SchedulerConfig,
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// 设置波特率（默认 9600）
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = Some(baud_rate);
        self
    }

    pub fn address(mut self, address: DeviceAddress) -> Self {
        self.query_config.device_address = address;
        self
    }

    pub fn vertical_mode(mut self, mode: VerticalAngleMode) -> Self {
        self.query_config.vertical_mode = mode;
        self
    }

    /// 设置查询间隔（调用方负责限幅）
    pub fn query_interval(mut self, interval: Duration) -> Self {
        self.scheduler_config.query_interval = interval;
        self
    }

    /// 完整替换查询配置（会覆盖之前设置的地址和垂直模式）
    pub fn query_config(mut self, config: QueryConfig) -> Self {
        self.query_config = config;
        self
    }

    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler_config = config;
        self
    }

    /// 打开串口并启动调度线程
    ///
    /// # 错误
    /// - `DriverError::NotConnected`: 未设置串口
    /// - `DriverError::Serial`: 串口打开失败
    pub fn build(self) -> Result<Scheduler, DriverError> {
        let port = self.port.as_deref().ok_or(DriverError::NotConnected)?;
        let baud_rate = self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE);
        let transport = SerialTransport::open(port, baud_rate)?;
        info!(
            "Connected to {} @ {}bps, address {}",
            port, baud_rate, self.query_config.device_address
        );
        Ok(self.build_with_transport(transport))
    }

    /// 使用已打开的传输启动调度线程（测试或自定义传输）
    pub fn build_with_transport<T>(self, transport: T) -> Scheduler
    where
        T: Transport + Send + 'static,
    {
        Scheduler::spawn(transport, self.query_config, self.scheduler_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = ControllerBuilder::new();
        assert!(builder.port.is_none());
        assert_eq!(builder.query_config, QueryConfig::default());
        assert_eq!(builder.scheduler_config.query_interval, Duration::from_millis(380));
    }

    #[test]
    fn test_builder_chain() {
        let address = DeviceAddress::new(0x0A).unwrap();
        let builder = ControllerBuilder::new()
            .port("COM3")
            .baud_rate(4800)
            .address(address)
            .vertical_mode(VerticalAngleMode::Direct)
            .query_interval(Duration::from_millis(1000));
        assert_eq!(builder.port.as_deref(), Some("COM3"));
        assert_eq!(builder.baud_rate, Some(4800));
        assert_eq!(builder.query_config.device_address, address);
        assert_eq!(builder.query_config.vertical_mode, VerticalAngleMode::Direct);
        assert_eq!(
            builder.scheduler_config.query_interval,
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_build_without_port_fails() {
        assert!(matches!(
            ControllerBuilder::new().build(),
            Err(DriverError::NotConnected)
        ));
    }
}
