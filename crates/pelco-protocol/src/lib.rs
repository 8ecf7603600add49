//! # PELCO-D Protocol
//!
//! 云台/天线转台 PELCO-D 串口协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 协议常量定义
//! - `control`: 运动/绝对位置命令帧构建
//! - `query`: 角度查询帧构建、应答校验与角度解码
//!
//! ## 帧格式
//!
//! ```text
//! [0xFF, address, cmd1, cmd2, data1, data2, checksum]
//! checksum = (address + cmd1 + cmd2 + data1 + data2) mod 256
//! ```
//!
//! 角度数据使用大端 16 位无符号整数，单位 0.01°。

pub mod constants;
pub mod control;
pub mod query;

// 重新导出常用类型
pub use constants::*;
pub use control::*;
pub use query::*;

use std::fmt;
use thiserror::Error;

/// 协议错误类型（构帧前的参数校验失败）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid device address: {0} (expected 0x01..=0xFF)")]
    InvalidAddress(u16),

    #[error("{axis} angle out of range: {value}")]
    AngleOutOfRange { axis: Axis, value: f64 },

    #[error("{axis} angle is not a finite number")]
    NonFiniteAngle { axis: Axis },
}

// ============================================================================
// 设备地址
// ============================================================================

/// 设备地址（0x01..=0xFF）
///
/// 只能通过 [`DeviceAddress::new`] 构造，越界值直接拒绝，不做截断。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u16", into = "u16"))]
pub struct DeviceAddress(u8);

impl DeviceAddress {
    /// 创建设备地址
    ///
    /// # 错误
    /// - `ProtocolError::InvalidAddress`: 地址为 0 或大于 0xFF
    pub fn new(value: u16) -> Result<Self, ProtocolError> {
        if !(u16::from(MIN_ADDRESS)..=u16::from(MAX_ADDRESS)).contains(&value) {
            return Err(ProtocolError::InvalidAddress(value));
        }
        u8::try_from(value)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidAddress(value))
    }

    /// 原始字节值
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for DeviceAddress {
    fn default() -> Self {
        Self(DEFAULT_ADDRESS)
    }
}

impl TryFrom<u16> for DeviceAddress {
    type Error = ProtocolError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceAddress> for u16 {
    fn from(address: DeviceAddress) -> Self {
        u16::from(address.0)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

// ============================================================================
// 命令帧
// ============================================================================

/// 7 字节 PELCO-D 命令帧
///
/// 只能由本 crate 的编码函数构造，创建后不可修改。
///
/// # Example
///
/// ```rust
/// use pelco_protocol::{DeviceAddress, Direction, move_frame};
///
/// let address = DeviceAddress::new(0x01).unwrap();
/// let frame = move_frame(address, Direction::Up, 0x20);
/// assert_eq!(frame.as_bytes(), &[0xFF, 0x01, 0x00, 0x10, 0x00, 0x20, 0x31]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandFrame([u8; FRAME_LEN]);

impl CommandFrame {
    /// 组帧并追加校验和
    pub(crate) fn new(address: DeviceAddress, cmd1: u8, cmd2: u8, data1: u8, data2: u8) -> Self {
        let body = [address.get(), cmd1, cmd2, data1, data2];
        Self([
            FRAME_HEADER,
            body[0],
            body[1],
            body[2],
            body[3],
            body[4],
            checksum(&body),
        ])
    }

    /// 完整帧字节
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    pub fn address(&self) -> u8 {
        self.0[1]
    }

    pub fn cmd1(&self) -> u8 {
        self.0[2]
    }

    pub fn cmd2(&self) -> u8 {
        self.0[3]
    }

    /// 数据字节（data1, data2）
    pub fn data(&self) -> [u8; 2] {
        [self.0[4], self.0[5]]
    }

    /// 数据字节按大端解释的 16 位值
    pub fn data_u16(&self) -> u16 {
        u16::from_be_bytes(self.data())
    }

    pub fn checksum(&self) -> u8 {
        self.0[6]
    }

    /// 大写十六进制（无分隔符），用于日志
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_hex(&self.0))
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// 校验和：逐字节求和取低 8 位
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// 以空格分隔的大写十六进制（如 `FF 01 00 10 00 20 31`）
///
/// 空输入返回空字符串。
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_address_bounds() {
        assert!(DeviceAddress::new(0).is_err());
        assert_eq!(DeviceAddress::new(1).unwrap().get(), 0x01);
        assert_eq!(DeviceAddress::new(0xFF).unwrap().get(), 0xFF);
        assert_eq!(
            DeviceAddress::new(0x100),
            Err(ProtocolError::InvalidAddress(0x100))
        );
    }

    #[test]
    fn test_address_display() {
        let address = DeviceAddress::new(0x0A).unwrap();
        assert_eq!(address.to_string(), "0x0A");
        assert_eq!(DeviceAddress::default().get(), 0x01);
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[0xFF, 0x01]), 0x00);
        assert_eq!(checksum(&[0x01, 0x00, 0x10, 0x00, 0x20]), 0x31);
        assert_eq!(checksum(&[]), 0x00);
    }

    #[test]
    fn test_frame_accessors() {
        let address = DeviceAddress::new(0x02).unwrap();
        let frame = CommandFrame::new(address, 0x00, 0x4B, 0x8C, 0xA0);
        assert_eq!(frame.address(), 0x02);
        assert_eq!(frame.cmd1(), 0x00);
        assert_eq!(frame.cmd2(), 0x4B);
        assert_eq!(frame.data(), [0x8C, 0xA0]);
        assert_eq!(frame.data_u16(), 36000);
        assert_eq!(frame.checksum(), checksum(&frame.as_bytes()[1..6]));
    }

    #[test]
    fn test_hex_formatting() {
        let address = DeviceAddress::new(0x01).unwrap();
        let frame = CommandFrame::new(address, 0x00, 0x10, 0x00, 0x20);
        assert_eq!(frame.to_string(), "FF 01 00 10 00 20 31");
        assert_eq!(frame.to_hex(), "FF010010002031");
        assert_eq!(format_hex(&[]), "");
    }

    proptest! {
        #[test]
        fn prop_checksum_is_sum_of_body(
            address in 1u16..=255,
            cmd1 in any::<u8>(),
            cmd2 in any::<u8>(),
            data1 in any::<u8>(),
            data2 in any::<u8>(),
        ) {
            let addr = DeviceAddress::new(address).unwrap();
            let frame = CommandFrame::new(addr, cmd1, cmd2, data1, data2);
            let expected = (u32::from(addr.get())
                + u32::from(cmd1)
                + u32::from(cmd2)
                + u32::from(data1)
                + u32::from(data2))
                % 256;
            prop_assert_eq!(u32::from(frame.checksum()), expected);
            prop_assert_eq!(frame.as_bytes()[0], FRAME_HEADER);
            prop_assert_eq!(frame.as_bytes().len(), FRAME_LEN);
        }
    }
}
