//! 跟踪参数
//!
//! 数值参数多来自用户输入的文本。解析失败不会中断跟踪：
//! 调用方回退到上一个有效值或默认值，并记录 `warn!`。

use crate::ConfigParseError;
use std::time::Duration;
use tracing::warn;

/// 默认位置变化阈值（度）
pub const DEFAULT_THRESHOLD_DEG: f64 = 0.1;

/// 默认命令锁定时间
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(200);

/// 跟踪数据轮询间隔范围（毫秒）
pub const MIN_TRACKING_INTERVAL_MS: u64 = 100;
pub const MAX_TRACKING_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_TRACKING_INTERVAL_MS: u64 = 1_000;

/// 解析有限浮点数
///
/// # 错误
/// - `ConfigParseError::InvalidNumber`: 不是数字
/// - `ConfigParseError::NonFinite`: NaN 或无穷大
pub fn parse_number(field: &'static str, text: &str) -> Result<f64, ConfigParseError> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| ConfigParseError::InvalidNumber {
            field,
            input: text.to_string(),
        })?;
    if !value.is_finite() {
        return Err(ConfigParseError::NonFinite { field });
    }
    Ok(value)
}

/// 角度偏移（跟踪目标减去偏移后再下发）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AngleOffset {
    pub azimuth_delta: f64,
    pub elevation_delta: f64,
}

impl AngleOffset {
    pub fn new(azimuth_delta: f64, elevation_delta: f64) -> Self {
        Self {
            azimuth_delta,
            elevation_delta,
        }
    }

    /// 从文本解析偏移
    pub fn parse(azimuth: &str, elevation: &str) -> Result<Self, ConfigParseError> {
        Ok(Self::new(
            parse_number("azimuth_delta", azimuth)?,
            parse_number("elevation_delta", elevation)?,
        ))
    }

    /// 从文本解析偏移，失败时回退为零偏移
    pub fn parse_or_zero(azimuth: &str, elevation: &str) -> Self {
        Self::parse(azimuth, elevation).unwrap_or_else(|e| {
            warn!("{}, using zero offset", e);
            Self::default()
        })
    }

    /// 应用偏移：方位角取模到 [0, 360)，俯仰角限制在 [-90, 90]
    pub fn apply(&self, azimuth: f64, elevation: f64) -> (f64, f64) {
        let mut az = (azimuth - self.azimuth_delta).rem_euclid(360.0);
        // rem_euclid 对极小负数可能得到 360.0
        if az >= 360.0 {
            az = 0.0;
        }
        let el = (elevation - self.elevation_delta).clamp(-90.0, 90.0);
        (az, el)
    }
}

/// 跟踪节流配置
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThrottleConfig {
    /// 位置变化阈值（度，严格大于才重发）
    pub threshold_deg: f64,
    /// 发送一组修正命令后的锁定时间
    pub cooldown: Duration,
    pub offset: AngleOffset,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            threshold_deg: DEFAULT_THRESHOLD_DEG,
            cooldown: DEFAULT_COOLDOWN,
            offset: AngleOffset::default(),
        }
    }
}

impl ThrottleConfig {
    /// 设置阈值，非正数或非有限值回退到默认值 0.1°
    pub fn with_threshold(mut self, threshold_deg: f64) -> Self {
        self.threshold_deg = sanitize_threshold(threshold_deg);
        self
    }

    pub fn with_offset(mut self, offset: AngleOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// 实际使用的阈值（直接构造的配置也经过同样的回退）
    pub fn effective_threshold(&self) -> f64 {
        if self.threshold_deg.is_finite() && self.threshold_deg > 0.0 {
            self.threshold_deg
        } else {
            DEFAULT_THRESHOLD_DEG
        }
    }
}

fn sanitize_threshold(threshold_deg: f64) -> f64 {
    if threshold_deg.is_finite() && threshold_deg > 0.0 {
        threshold_deg
    } else {
        warn!(
            "Invalid threshold {}, falling back to {}",
            threshold_deg, DEFAULT_THRESHOLD_DEG
        );
        DEFAULT_THRESHOLD_DEG
    }
}

/// 将跟踪间隔限制在 100..=10000 毫秒
pub fn clamp_tracking_interval(ms: u64) -> u64 {
    ms.clamp(MIN_TRACKING_INTERVAL_MS, MAX_TRACKING_INTERVAL_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("x", " 1.5 ").unwrap(), 1.5);
        assert!(matches!(
            parse_number("x", "abc"),
            Err(ConfigParseError::InvalidNumber { field: "x", .. })
        ));
        assert!(matches!(
            parse_number("x", "NaN"),
            Err(ConfigParseError::NonFinite { field: "x" })
        ));
    }

    #[test]
    fn test_offset_apply_wraps_and_clamps() {
        let offset = AngleOffset::new(10.0, 5.0);
        assert_eq!(offset.apply(5.0, 30.0), (355.0, 25.0));
        assert_eq!(offset.apply(370.0, 100.0), (0.0, 90.0));
        assert_eq!(offset.apply(100.0, -90.0), (90.0, -90.0));

        let negative = AngleOffset::new(-20.0, -10.0);
        assert_eq!(negative.apply(350.0, 85.0), (10.0, 90.0));
    }

    #[test]
    fn test_offset_parse_fallback() {
        assert_eq!(
            AngleOffset::parse("1.5", "-2").unwrap(),
            AngleOffset::new(1.5, -2.0)
        );
        assert_eq!(AngleOffset::parse_or_zero("oops", "1"), AngleOffset::default());
    }

    #[test]
    fn test_threshold_fallback() {
        assert_eq!(ThrottleConfig::default().with_threshold(0.5).threshold_deg, 0.5);
        assert_eq!(ThrottleConfig::default().with_threshold(0.0).threshold_deg, 0.1);
        assert_eq!(ThrottleConfig::default().with_threshold(-1.0).threshold_deg, 0.1);

        let raw = ThrottleConfig {
            threshold_deg: -3.0,
            ..ThrottleConfig::default()
        };
        assert_eq!(raw.effective_threshold(), 0.1);
    }

    #[test]
    fn test_clamp_tracking_interval() {
        assert_eq!(clamp_tracking_interval(10), 100);
        assert_eq!(clamp_tracking_interval(2500), 2500);
        assert_eq!(clamp_tracking_interval(60_000), 10_000);
    }

    proptest! {
        #[test]
        fn prop_offset_stays_in_range(
            az in -1000.0f64..1000.0,
            el in -200.0f64..200.0,
            daz in -360.0f64..360.0,
            del in -90.0f64..90.0,
        ) {
            let (oaz, oel) = AngleOffset::new(daz, del).apply(az, el);
            prop_assert!((0.0..360.0).contains(&oaz));
            prop_assert!((-90.0..=90.0).contains(&oel));
        }
    }
}
