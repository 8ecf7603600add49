//! 跟踪位置节流
//!
//! 决策分两步：[`TrackingThrottle::evaluate`] 只读状态，给出是否需要发送一组修正命令；
//! 命令成功入队后由 [`TrackingThrottle::commit`] 更新最后下发位置并加锁。
//! 被跳过、被锁定或入队失败的样本都不会改变状态。

use crate::config::ThrottleConfig;
use pelco_driver::{CommandBurst, LabeledCommand};
use pelco_protocol::{
    Axis, DeviceAddress, ProtocolError, set_horizontal_angle, set_vertical_angle, stop,
};
use smallvec::smallvec;
use std::time::Instant;

/// 阈值比较容差（远小于 0.01° 的编码分辨率，只吸收十进制输入的浮点误差）
const THRESHOLD_TOLERANCE: f64 = 1e-9;

/// 节流状态（仅由 [`TrackingThrottle`] 修改）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackingState {
    pub last_commanded_azimuth: Option<f64>,
    pub last_commanded_elevation: Option<f64>,
    /// 锁定截止时间（单调时钟）
    pub locked_until: Option<Instant>,
}

impl TrackingState {
    pub fn is_locked(&self, now: Instant) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }
}

/// 一组待发送的跟踪修正
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    /// 偏移后的目标方位角
    pub azimuth: f64,
    /// 偏移后的目标俯仰角
    pub elevation: f64,
    /// 停止、水平、垂直三帧
    pub burst: CommandBurst,
}

/// 单个样本的节流结果
#[derive(Debug, Clone, PartialEq)]
pub enum ThrottleDecision {
    /// 位置变化足够大且未锁定
    Send(Correction),
    /// 变化未超过阈值
    Unchanged,
    /// 变化足够大但处于锁定期
    Locked,
    /// 目标已落到地平线以下
    BelowHorizon,
}

/// 跟踪位置节流器
#[derive(Debug, Clone, Default)]
pub struct TrackingThrottle {
    config: ThrottleConfig,
    state: TrackingState,
}

impl TrackingThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            state: TrackingState::default(),
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// 替换配置（状态保留）
    pub fn set_config(&mut self, config: ThrottleConfig) {
        self.config = config;
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    /// 清空状态，下一个样本视为首个样本
    pub fn reset(&mut self) {
        self.state = TrackingState::default();
    }

    /// 评估一个外部跟踪样本
    ///
    /// # 错误
    /// - `ProtocolError::NonFiniteAngle`: 样本含 NaN 或无穷大
    pub fn evaluate(
        &self,
        azimuth: f64,
        elevation: f64,
        address: DeviceAddress,
        now: Instant,
    ) -> Result<ThrottleDecision, ProtocolError> {
        for (axis, value) in [(Axis::Horizontal, azimuth), (Axis::Vertical, elevation)] {
            if !value.is_finite() {
                return Err(ProtocolError::NonFiniteAngle { axis });
            }
        }
        if elevation < 0.0 {
            return Ok(ThrottleDecision::BelowHorizon);
        }

        let (az, el) = self.config.offset.apply(azimuth, elevation);
        if !self.has_changed(az, el) {
            return Ok(ThrottleDecision::Unchanged);
        }
        if self.state.is_locked(now) {
            return Ok(ThrottleDecision::Locked);
        }

        let burst = smallvec![
            LabeledCommand::new(stop(address), "Tracking Stop"),
            LabeledCommand::new(set_horizontal_angle(address, az)?, "Tracking Set H"),
            LabeledCommand::new(set_vertical_angle(address, el)?, "Tracking Set V"),
        ];
        Ok(ThrottleDecision::Send(Correction {
            azimuth: az,
            elevation: el,
            burst,
        }))
    }

    /// 修正命令已入队：记录位置并锁定
    pub fn commit(&mut self, correction: &Correction, now: Instant) {
        self.state.last_commanded_azimuth = Some(correction.azimuth);
        self.state.last_commanded_elevation = Some(correction.elevation);
        self.state.locked_until = Some(now + self.config.cooldown);
    }

    fn has_changed(&self, az: f64, el: f64) -> bool {
        let (Some(last_az), Some(last_el)) = (
            self.state.last_commanded_azimuth,
            self.state.last_commanded_elevation,
        ) else {
            return true;
        };
        // 严格大于：恰好等于阈值（含浮点误差）不算变化
        let threshold = self.config.effective_threshold() + THRESHOLD_TOLERANCE;
        (az - last_az).abs() > threshold || (el - last_el).abs() > threshold
    }
}
