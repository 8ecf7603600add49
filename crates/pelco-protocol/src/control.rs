//! 控制帧构建
//!
//! 方向运动、停止以及水平/垂直绝对角度设置。所有函数都是纯函数，
//! 参数校验在组帧之前完成，失败时不会产生任何帧。

use crate::query::Axis;
use crate::{
    ANGLE_SCALE, CMD2_DOWN, CMD2_LEFT, CMD2_RIGHT, CMD2_STOP, CMD2_UP, CommandFrame,
    DeviceAddress, ProtocolError, RAW_FULL_TURN,
};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 运动方向（cmd2 位掩码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Direction {
    Up = CMD2_UP,
    Down = CMD2_DOWN,
    Left = CMD2_LEFT,
    Right = CMD2_RIGHT,
}

impl Direction {
    /// 是否为水平方向（速度放在 data1）
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "u" => Ok(Direction::Up),
            "down" | "d" => Ok(Direction::Down),
            "left" | "l" => Ok(Direction::Left),
            "right" | "r" => Ok(Direction::Right),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// 方向运动命令
///
/// 水平运动时速度占用 data1，垂直运动时占用 data2，未使用的数据字节为 0。
pub fn move_frame(address: DeviceAddress, direction: Direction, speed: u8) -> CommandFrame {
    let (data1, data2) = if direction.is_horizontal() {
        (speed, 0x00)
    } else {
        (0x00, speed)
    };
    CommandFrame::new(address, 0x00, direction.into(), data1, data2)
}

/// 停止命令
pub fn stop(address: DeviceAddress) -> CommandFrame {
    CommandFrame::new(address, 0x00, CMD2_STOP, 0x00, 0x00)
}

/// 水平绝对角度设置（0 ≤ angle ≤ 360）
///
/// # 错误
/// - `ProtocolError::NonFiniteAngle`: NaN 或无穷大
/// - `ProtocolError::AngleOutOfRange`: 超出 [0, 360]
pub fn set_horizontal_angle(
    address: DeviceAddress,
    angle_deg: f64,
) -> Result<CommandFrame, ProtocolError> {
    check_range(Axis::Horizontal, angle_deg, 0.0, 360.0)?;
    Ok(absolute_frame(address, Axis::Horizontal, encode_positive(angle_deg)))
}

/// 垂直绝对角度设置（-90 ≤ angle ≤ 90）
///
/// 负角度映射到原始值上半区 `(27000, 36000]`：`36000 - round(-angle * 100)`，
/// 与查询应答的解码规则互逆。
pub fn set_vertical_angle(
    address: DeviceAddress,
    angle_deg: f64,
) -> Result<CommandFrame, ProtocolError> {
    check_range(Axis::Vertical, angle_deg, -90.0, 90.0)?;
    Ok(absolute_frame(address, Axis::Vertical, encode_vertical_raw(angle_deg)))
}

/// 有符号垂直角度 -> 原始值（调用方负责范围校验）
pub fn encode_vertical_raw(angle_deg: f64) -> u16 {
    let encoded = if angle_deg >= 0.0 {
        (angle_deg * ANGLE_SCALE).round()
    } else {
        f64::from(RAW_FULL_TURN) - (-angle_deg * ANGLE_SCALE).round()
    };
    encoded.clamp(0.0, f64::from(RAW_FULL_TURN)) as u16
}

fn absolute_frame(address: DeviceAddress, axis: Axis, raw: u16) -> CommandFrame {
    let [data1, data2] = raw.to_be_bytes();
    CommandFrame::new(address, 0x00, axis.absolute_command(), data1, data2)
}

fn encode_positive(angle_deg: f64) -> u16 {
    (angle_deg * ANGLE_SCALE)
        .round()
        .clamp(0.0, f64::from(RAW_FULL_TURN)) as u16
}

fn check_range(axis: Axis, value: f64, min: f64, max: f64) -> Result<(), ProtocolError> {
    if !value.is_finite() {
        return Err(ProtocolError::NonFiniteAngle { axis });
    }
    if value < min || value > max {
        return Err(ProtocolError::AngleOutOfRange { axis, value });
    }
    Ok(())
}
