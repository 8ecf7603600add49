//! # PELCO-D Serial Transport Layer
//!
//! 串口硬件抽象层，提供统一的字节流传输接口。
//!
//! 驱动层只依赖 [`Transport`] trait，真实串口由 [`SerialTransport`] 实现，
//! 测试使用 `mock` feature 提供的 [`mock::MockTransport`]。

use std::io;
use thiserror::Error;

mod serial;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use serial::{PortInfo, SerialTransport, available_ports};

/// 常用波特率
pub const SUPPORTED_BAUD_RATES: [u32; 7] = [2400, 4800, 9600, 19200, 38400, 57600, 115200];

/// 默认波特率
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("Port not open")]
    NotOpen,
}

impl SerialError {
    /// 是否意味着设备已断开（继续重试没有意义）
    pub fn is_fatal(&self) -> bool {
        match self {
            SerialError::NotOpen => true,
            SerialError::Io(e) => is_disconnect_kind(e.kind()),
            SerialError::Port(e) => match e.kind() {
                serialport::ErrorKind::NoDevice => true,
                serialport::ErrorKind::Io(kind) => is_disconnect_kind(kind),
                _ => false,
            },
        }
    }
}

fn is_disconnect_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::PermissionDenied
    )
}

/// 字节流双工通道
///
/// 由驱动层的调度循环独占，同一时刻只有一个请求在途。
pub trait Transport {
    /// 写入完整字节序列
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// 输入缓冲区中等待读取的字节数
    fn bytes_waiting(&mut self) -> Result<usize, SerialError>;

    /// 读取当前可用的全部字节（无数据时返回空）
    fn read_available(&mut self) -> Result<Vec<u8>, SerialError>;

    /// 清空输入缓冲区
    fn clear_input_buffer(&mut self) -> Result<(), SerialError>;

    /// 关闭端口（幂等）
    fn close(&mut self) {}

    fn is_open(&self) -> bool {
        true
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        (**self).write(bytes)
    }

    fn bytes_waiting(&mut self) -> Result<usize, SerialError> {
        (**self).bytes_waiting()
    }

    fn read_available(&mut self) -> Result<Vec<u8>, SerialError> {
        (**self).read_available()
    }

    fn clear_input_buffer(&mut self) -> Result<(), SerialError> {
        (**self).clear_input_buffer()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}
