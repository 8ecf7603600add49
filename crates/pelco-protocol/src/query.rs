//! 角度查询帧
//!
//! 查询帧构建、应答帧校验以及原始角度到度数的解码。
//! 这里只有纯函数，超时与重试由驱动层负责。

use crate::{
    ANGLE_SCALE, CMD2_QUERY_HORIZONTAL, CMD2_QUERY_VERTICAL, CMD2_SET_HORIZONTAL,
    CMD2_SET_VERTICAL, CommandFrame, DeviceAddress, FRAME_HEADER, FRAME_LEN, RESPONSE_OFFSET,
    checksum,
};
use std::fmt;
use thiserror::Error;

/// 轴（水平/方位、垂直/俯仰）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    /// 查询命令字（0x51 / 0x53）
    pub fn query_command(self) -> u8 {
        match self {
            Axis::Horizontal => CMD2_QUERY_HORIZONTAL,
            Axis::Vertical => CMD2_QUERY_VERTICAL,
        }
    }

    /// 应答命令字（查询命令字 + 0x08）
    pub fn response_command(self) -> u8 {
        self.query_command() + RESPONSE_OFFSET
    }

    /// 绝对位置设置命令字（0x4B / 0x4D）
    pub fn absolute_command(self) -> u8 {
        match self {
            Axis::Horizontal => CMD2_SET_HORIZONTAL,
            Axis::Vertical => CMD2_SET_VERTICAL,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Horizontal => f.pad("horizontal"),
            Axis::Vertical => f.pad("vertical"),
        }
    }
}

/// 构建角度查询帧 `[0xFF, addr, 0x00, query_cmd, 0x00, 0x00, checksum]`
pub fn query_frame(address: DeviceAddress, axis: Axis) -> CommandFrame {
    CommandFrame::new(address, 0x00, axis.query_command(), 0x00, 0x00)
}

// ============================================================================
// 应答校验
// ============================================================================

/// 应答帧格式错误（按校验顺序）
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    #[error("response too short: {len} bytes")]
    TooShort { len: usize },

    #[error("bad header byte: 0x{0:02X}")]
    BadHeader(u8),

    #[error("address mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    AddressMismatch { expected: u8, actual: u8 },

    #[error("unexpected response command: expected 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedCommand { expected: u8, actual: u8 },

    #[error("checksum mismatch: computed 0x{computed:02X}, received 0x{received:02X}")]
    ChecksumMismatch { computed: u8, received: u8 },
}

/// 校验应答帧并提取原始角度
///
/// 只看前 7 个字节，依次检查：长度、帧头、地址、应答命令字、校验和。
/// 原始角度为 `data1:data2` 大端 16 位值（0–36000 对应 0–360.00°）。
pub fn parse_response(
    bytes: &[u8],
    address: DeviceAddress,
    axis: Axis,
) -> Result<u16, MalformedReason> {
    if bytes.len() < FRAME_LEN {
        return Err(MalformedReason::TooShort { len: bytes.len() });
    }
    let frame = &bytes[..FRAME_LEN];

    if frame[0] != FRAME_HEADER {
        return Err(MalformedReason::BadHeader(frame[0]));
    }
    if frame[1] != address.get() {
        return Err(MalformedReason::AddressMismatch {
            expected: address.get(),
            actual: frame[1],
        });
    }
    let expected = axis.response_command();
    if frame[3] != expected {
        return Err(MalformedReason::UnexpectedCommand {
            expected,
            actual: frame[3],
        });
    }
    let computed = checksum(&frame[1..6]);
    if computed != frame[6] {
        return Err(MalformedReason::ChecksumMismatch {
            computed,
            received: frame[6],
        });
    }

    Ok(u16::from_be_bytes([frame[4], frame[5]]))
}

// ============================================================================
// 角度解码
// ============================================================================

/// 垂直角度解码模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum VerticalAngleMode {
    /// 原样输出 0–360°
    Direct,
    /// 大于 180° 的值减去 360°
    Negative,
    /// 自动
    #[default]
    Auto,
}

impl VerticalAngleMode {
    pub fn as_str(self) -> &'static str {
        match self {
            VerticalAngleMode::Direct => "direct",
            VerticalAngleMode::Negative => "negative",
            VerticalAngleMode::Auto => "auto",
        }
    }
}

impl fmt::Display for VerticalAngleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VerticalAngleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(VerticalAngleMode::Direct),
            "negative" => Ok(VerticalAngleMode::Negative),
            "auto" => Ok(VerticalAngleMode::Auto),
            other => Err(format!("unknown vertical angle mode: {}", other)),
        }
    }
}

/// 水平角度：`raw / 100`
pub fn decode_horizontal(raw: u16) -> f64 {
    f64::from(raw) / ANGLE_SCALE
}

/// 垂直角度解码
pub fn decode_vertical(raw: u16, mode: VerticalAngleMode) -> f64 {
    let deg = f64::from(raw) / ANGLE_SCALE;
    match mode {
        VerticalAngleMode::Direct => deg,
        VerticalAngleMode::Negative => wrap_negative(deg),
        // 三个分区的结果都与 Negative 相同；是否需要结合上一次角度做消歧尚待确认
        VerticalAngleMode::Auto => {
            if deg <= 90.0 || deg >= 270.0 {
                wrap_negative(deg)
            } else if deg > 180.0 {
                deg - 360.0
            } else {
                deg
            }
        },
    }
}

fn wrap_negative(deg: f64) -> f64 {
    if deg > 180.0 { deg - 360.0 } else { deg }
}

/// 按轴解码
pub fn decode_angle(axis: Axis, raw: u16, mode: VerticalAngleMode) -> f64 {
    match axis {
        Axis::Horizontal => decode_horizontal(raw),
        Axis::Vertical => decode_vertical(raw, mode),
    }
}

// ============================================================================
// 原始值分区（诊断用）
// ============================================================================

/// 垂直原始值所在分区
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawAngleClass {
    /// 0–90°
    PositiveLow,
    /// 90–180°
    PositiveHigh,
    /// -180° 到 -90°（原始 180–270°）
    NegativeLow,
    /// -90° 到 0°（原始 270–360°）
    NegativeHigh,
    /// 超出 0–35999
    Unknown,
}

impl fmt::Display for RawAngleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RawAngleClass::PositiveLow => "positive (0..90)",
            RawAngleClass::PositiveHigh => "positive (90..180)",
            RawAngleClass::NegativeLow => "negative (-180..-90)",
            RawAngleClass::NegativeHigh => "negative (-90..0)",
            RawAngleClass::Unknown => "unknown range",
        };
        f.write_str(text)
    }
}

/// 垂直原始值的多种表示
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleRepresentation {
    pub raw: u16,
    pub direct_deg: f64,
    pub negative_deg: f64,
    pub class: RawAngleClass,
}

/// 对垂直原始值分区，并给出直接/负角两种表示
pub fn classify_vertical_raw(raw: u16) -> AngleRepresentation {
    let direct_deg = decode_horizontal(raw);
    let class = match raw {
        0..=9000 => RawAngleClass::PositiveLow,
        9001..=17999 => RawAngleClass::PositiveHigh,
        18000..=26999 => RawAngleClass::NegativeLow,
        27000..=35999 => RawAngleClass::NegativeHigh,
        _ => RawAngleClass::Unknown,
    };
    let negative_deg = match class {
        RawAngleClass::NegativeLow | RawAngleClass::NegativeHigh => direct_deg - 360.0,
        _ => wrap_negative(direct_deg),
    };
    AngleRepresentation {
        raw,
        direct_deg,
        negative_deg,
        class,
    }
}
