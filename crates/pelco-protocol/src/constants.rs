//! PELCO-D 协议常量定义
//!
//! 集中定义帧格式、命令字和编码比例，避免在代码中散落"魔法数"。

// ============================================================================
// 帧格式
// ============================================================================

/// 帧头（同步字节）
pub const FRAME_HEADER: u8 = 0xFF;

/// 帧长度（双向固定 7 字节）
pub const FRAME_LEN: usize = 7;

/// 最小设备地址
pub const MIN_ADDRESS: u8 = 0x01;

/// 最大设备地址
pub const MAX_ADDRESS: u8 = 0xFF;

/// 默认设备地址
pub const DEFAULT_ADDRESS: u8 = 0x01;

// ============================================================================
// 运动命令（cmd2 位掩码）
// ============================================================================

pub const CMD2_UP: u8 = 0x10;
pub const CMD2_DOWN: u8 = 0x08;
pub const CMD2_LEFT: u8 = 0x04;
pub const CMD2_RIGHT: u8 = 0x02;
pub const CMD2_STOP: u8 = 0x00;

/// 默认运动速度
pub const DEFAULT_SPEED: u8 = 0x20;

// ============================================================================
// 绝对位置命令
// ============================================================================

/// 水平绝对角度设置
pub const CMD2_SET_HORIZONTAL: u8 = 0x4B;

/// 垂直绝对角度设置
pub const CMD2_SET_VERTICAL: u8 = 0x4D;

// ============================================================================
// 角度查询
// ============================================================================

/// 水平角度查询
pub const CMD2_QUERY_HORIZONTAL: u8 = 0x51;

/// 垂直角度查询
pub const CMD2_QUERY_VERTICAL: u8 = 0x53;

/// 应答命令字相对查询命令字的偏移（0x51 -> 0x59, 0x53 -> 0x5B）
pub const RESPONSE_OFFSET: u8 = 0x08;

// ============================================================================
// 角度编码
// ============================================================================

/// 原始角度比例（0.01° 为单位）
pub const ANGLE_SCALE: f64 = 100.0;

/// 原始角度最大值（360.00°）
pub const RAW_FULL_TURN: u16 = 36000;
