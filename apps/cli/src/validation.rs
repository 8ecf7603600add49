//! 输入验证模块
//!
//! 地址和波特率无效时直接报错；数值调节参数无效时回退到默认值并给出警告，
//! 越界时限制到允许范围。

use anyhow::{Result, bail};
use pelco_protocol::DeviceAddress;
use pelco_serial::SUPPORTED_BAUD_RATES;
use pelco_tracking::config::{
    DEFAULT_THRESHOLD_DEG, DEFAULT_TRACKING_INTERVAL_MS, MAX_TRACKING_INTERVAL_MS,
    MIN_TRACKING_INTERVAL_MS, clamp_tracking_interval,
};
use pelco_tracking::parse_number;
use tracing::warn;

/// 角度查询间隔范围（毫秒）
pub const MIN_QUERY_INTERVAL_MS: u64 = 50;
pub const MAX_QUERY_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_QUERY_INTERVAL_MS: u64 = 380;

/// 解析设备地址（十六进制，可带 `0x` 前缀）
///
/// 越界地址报错，不做截断。
pub fn parse_address(text: &str) -> Result<DeviceAddress> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let value = u16::from_str_radix(digits, 16)
        .map_err(|_| anyhow::anyhow!("无效的设备地址: '{}'（应为十六进制，如 0x01）", text))?;
    Ok(DeviceAddress::new(value)?)
}

pub fn validate_baud_rate(baud_rate: u32) -> Result<u32> {
    if !SUPPORTED_BAUD_RATES.contains(&baud_rate) {
        bail!(
            "不支持的波特率 {}，可选: {:?}",
            baud_rate,
            SUPPORTED_BAUD_RATES
        );
    }
    Ok(baud_rate)
}

/// 解析整数毫秒值并用 `clamp` 限幅；无法解析时回退到 `fallback`
fn parse_interval(field: &'static str, text: &str, fallback: u64, clamp: fn(u64) -> u64) -> u64 {
    let value = match parse_number(field, text) {
        Ok(value) => value.round(),
        Err(e) => {
            warn!("{}，使用 {} ms", e, fallback);
            return fallback;
        },
    };
    // 负数饱和为 0，超大值饱和为 u64::MAX，随后一并限幅
    let clamped = clamp(value as u64);
    if clamped as f64 != value {
        warn!("{} = {} 超出范围，限制为 {}", field, value, clamped);
    }
    clamped
}

pub fn parse_query_interval(text: &str, fallback: u64) -> u64 {
    parse_interval("query_interval_ms", text, fallback, clamp_query_interval)
}

pub fn parse_tracking_interval(text: &str, fallback: u64) -> u64 {
    parse_interval("tracking_interval_ms", text, fallback, clamp_tracking_interval)
}

/// 将查询间隔限制在 50..=5000 毫秒
pub fn clamp_query_interval(ms: u64) -> u64 {
    ms.clamp(MIN_QUERY_INTERVAL_MS, MAX_QUERY_INTERVAL_MS)
}

/// 解析阈值，非数字或非正数回退到 `fallback`（本身无效时回退到 0.1°）
pub fn parse_threshold(text: &str, fallback: f64) -> f64 {
    let fallback = if fallback > 0.0 { fallback } else { DEFAULT_THRESHOLD_DEG };
    match parse_number("threshold_deg", text) {
        Ok(value) if value > 0.0 => value,
        Ok(value) => {
            warn!("threshold_deg 必须大于 0（输入 {}），使用 {}", value, fallback);
            fallback
        },
        Err(e) => {
            warn!("{}，使用 {}", e, fallback);
            fallback
        },
    }
}

/// 解析角度偏移，无效时回退到 `fallback`
pub fn parse_offset(field: &'static str, text: &str, fallback: f64) -> f64 {
    parse_number(field, text).unwrap_or_else(|e| {
        warn!("{}，使用 {}", e, fallback);
        fallback
    })
}

/// 默认值（供 `config check` 显示）
pub fn defaults_summary() -> String {
    format!(
        "query_interval_ms {}..={} (默认 {}), tracking_interval_ms {}..={} (默认 {}), threshold_deg > 0 (默认 {})",
        MIN_QUERY_INTERVAL_MS,
        MAX_QUERY_INTERVAL_MS,
        DEFAULT_QUERY_INTERVAL_MS,
        MIN_TRACKING_INTERVAL_MS,
        MAX_TRACKING_INTERVAL_MS,
        DEFAULT_TRACKING_INTERVAL_MS,
        DEFAULT_THRESHOLD_DEG
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x01").unwrap().get(), 0x01);
        assert_eq!(parse_address("0A").unwrap().get(), 0x0A);
        assert_eq!(parse_address(" 0XFF ").unwrap().get(), 0xFF);
        assert!(parse_address("0x00").is_err());
        assert!(parse_address("0x100").is_err());
        assert!(parse_address("zz").is_err());
    }

    #[test]
    fn test_validate_baud_rate() {
        assert_eq!(validate_baud_rate(9600).unwrap(), 9600);
        assert!(validate_baud_rate(12345).is_err());
    }

    #[test]
    fn test_query_interval_clamp_and_fallback() {
        assert_eq!(parse_query_interval("1000", 380), 1000);
        assert_eq!(parse_query_interval("10", 380), 50);
        assert_eq!(parse_query_interval("99999", 380), 5000);
        assert_eq!(parse_query_interval("fast", 420), 420);
        assert_eq!(clamp_query_interval(0), 50);
    }

    #[test]
    fn test_tracking_interval_clamp_and_fallback() {
        assert_eq!(parse_tracking_interval("50", 1000), 100);
        assert_eq!(parse_tracking_interval("2000.4", 1000), 2000);
        assert_eq!(parse_tracking_interval("", 1000), 1000);
        assert_eq!(parse_tracking_interval("-5", 1000), 100);
        assert_eq!(parse_tracking_interval("1e12", 1000), 10_000);
    }

    #[test]
    fn test_threshold_fallback() {
        assert_eq!(parse_threshold("0.5", 0.1), 0.5);
        assert_eq!(parse_threshold("0", 0.2), 0.2);
        assert_eq!(parse_threshold("-1", 0.2), 0.2);
        assert_eq!(parse_threshold("abc", -3.0), 0.1);
    }

    #[test]
    fn test_offset_fallback() {
        assert_eq!(parse_offset("azimuth_delta", "-2.5", 0.0), -2.5);
        assert_eq!(parse_offset("azimuth_delta", "x", 1.0), 1.0);
    }
}
