//! 驱动层错误类型定义

use pelco_protocol::ProtocolError;
use pelco_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口错误
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    /// 参数校验错误（地址/角度越界）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 未连接（已断开或正在断开）
    #[error("Not connected")]
    NotConnected,

    /// 命令通道已关闭（调度线程退出）
    #[error("Command channel closed")]
    ChannelClosed,
}
