//! 角度查询引擎
//!
//! 每个轴的查询是一个显式状态机：
//!
//! ```text
//! Idle -> Sent -> Awaiting -> Decoded
//!                          -> TimedOut  -\
//!                          -> Malformed -+-> (attempt < max) Sent
//!                                         \-> (attempt == max) Exhausted
//! ```
//!
//! 帧校验与角度解码在 `pelco_protocol::query` 中，是纯函数；
//! 本模块只负责收发、等待和重试节奏。

use pelco_protocol::{
    Axis, DeviceAddress, FRAME_LEN, MalformedReason, VerticalAngleMode, decode_angle,
    format_hex, parse_response, query_frame,
};
use pelco_serial::Transport;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// 查询配置
///
/// 每次调用 [`QueryEngine::query_cycle`] 时按引用传入，引擎本身不保存配置。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueryConfig {
    /// 设备地址
    pub device_address: DeviceAddress,
    /// 单次尝试的应答超时（默认 350ms）
    pub response_timeout: Duration,
    /// 每轴最大尝试次数（默认 3）
    pub max_attempts: u32,
    /// 水平轴完成后到垂直轴开始的间隔（默认 50ms）
    pub inter_axis_delay: Duration,
    /// 重试前等待（默认 50ms）
    pub retry_delay: Duration,
    /// 等待应答时的轮询间隔（默认 1ms）
    pub poll_interval: Duration,
    /// 垂直角度解码模式
    pub vertical_mode: VerticalAngleMode,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            device_address: DeviceAddress::default(),
            response_timeout: Duration::from_millis(350),
            max_attempts: 3,
            inter_axis_delay: Duration::from_millis(50),
            retry_delay: Duration::from_millis(50),
            poll_interval: Duration::from_millis(1),
            vertical_mode: VerticalAngleMode::default(),
        }
    }
}

// ============================================================================
// 结果类型
// ============================================================================

/// 单轴读数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisReading {
    pub degrees: f64,
    pub raw: u16,
}

/// 单次尝试失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptFailure {
    /// 超时内累计不足 7 字节
    TimedOut { received: usize },
    /// 7 字节到齐但校验失败
    Malformed(MalformedReason),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::TimedOut { received } => {
                write!(f, "timed out ({} bytes received)", received)
            },
            AttemptFailure::Malformed(reason) => write!(f, "malformed response: {}", reason),
        }
    }
}

/// 单轴失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisFailure {
    /// 尝试次数用尽
    Exhausted {
        attempts: u32,
        last: AttemptFailure,
    },
    /// 串口读写失败，本轴中止
    Io { message: String, fatal: bool },
}

impl AxisFailure {
    pub fn is_fatal(&self) -> bool {
        matches!(self, AxisFailure::Io { fatal: true, .. })
    }
}

impl fmt::Display for AxisFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisFailure::Exhausted { attempts, last } => {
                write!(f, "exhausted after {} attempts, last: {}", attempts, last)
            },
            AxisFailure::Io { message, .. } => write!(f, "io error: {}", message),
        }
    }
}

/// 单轴查询结果（含诊断用的收发字节）
#[derive(Debug, Clone, PartialEq)]
pub struct AxisOutcome {
    pub axis: Axis,
    pub result: Result<AxisReading, AxisFailure>,
    /// 实际执行的尝试次数
    pub attempts: u32,
    /// 最后一次发送的字节
    pub tx: Vec<u8>,
    /// 最后一次收到的字节（最多 7 个）
    pub rx: Vec<u8>,
}

impl AxisOutcome {
    pub fn reading(&self) -> Option<AxisReading> {
        self.result.as_ref().ok().copied()
    }

    pub fn degrees(&self) -> Option<f64> {
        self.reading().map(|r| r.degrees)
    }
}

/// 一次成功查询得到的角度样本
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleSample {
    pub horizontal_deg: f64,
    pub vertical_deg: f64,
    pub horizontal_raw: u16,
    pub vertical_raw: u16,
    pub captured_at: Instant,
}

/// 完整查询周期（水平 + 垂直）的结果
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub device_address: DeviceAddress,
    pub vertical_mode: VerticalAngleMode,
    pub horizontal: AxisOutcome,
    pub vertical: AxisOutcome,
    pub completed_at: Instant,
}

impl QueryOutcome {
    /// 两个轴都解码成功才算成功
    pub fn is_success(&self) -> bool {
        self.horizontal.result.is_ok() && self.vertical.result.is_ok()
    }

    /// 只有一个轴成功
    pub fn is_partial(&self) -> bool {
        self.horizontal.result.is_ok() != self.vertical.result.is_ok()
    }

    pub fn sample(&self) -> Option<AngleSample> {
        let h = self.horizontal.reading()?;
        let v = self.vertical.reading()?;
        Some(AngleSample {
            horizontal_deg: h.degrees,
            vertical_deg: v.degrees,
            horizontal_raw: h.raw,
            vertical_raw: v.raw,
            captured_at: self.completed_at,
        })
    }

    /// 是否出现了意味着断线的串口错误
    pub fn has_fatal_io(&self) -> bool {
        [&self.horizontal, &self.vertical]
            .iter()
            .any(|a| matches!(&a.result, Err(f) if f.is_fatal()))
    }
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_success() { "ok" } else { "failed" };
        writeln!(
            f,
            "query {} - address {} - vertical mode {}",
            status, self.device_address, self.vertical_mode
        )?;
        for axis in [&self.horizontal, &self.vertical] {
            match &axis.result {
                Ok(r) => writeln!(
                    f,
                    "  {:<10} {:>8.2}°  raw {} (0x{:04X})",
                    axis.axis, r.degrees, r.raw, r.raw
                )?,
                Err(e) => writeln!(f, "  {:<10} {}", axis.axis, e)?,
            }
            writeln!(f, "    TX {}", hex_or_none(&axis.tx))?;
            writeln!(f, "    RX {}", hex_or_none(&axis.rx))?;
        }
        Ok(())
    }
}

fn hex_or_none(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        "(none)".to_string()
    } else {
        format_hex(bytes)
    }
}

// ============================================================================
// 状态机
// ============================================================================

/// 单轴查询状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisState {
    Idle,
    /// 第 `attempt` 次尝试即将发送
    Sent { attempt: u32 },
    Awaiting { attempt: u32 },
    Decoded { attempt: u32, raw: u16 },
    TimedOut { attempt: u32, received: usize },
    Malformed { attempt: u32, reason: MalformedReason },
    Exhausted { attempts: u32, last: AttemptFailure },
    /// 串口错误，提前结束
    Aborted { attempt: u32, message: String, fatal: bool },
}

impl AxisState {
    /// 失败后的下一状态：未用尽则回到 `Sent`，否则 `Exhausted`
    pub fn after_failure(attempt: u32, max_attempts: u32, failure: AttemptFailure) -> AxisState {
        if attempt < max_attempts {
            AxisState::Sent {
                attempt: attempt + 1,
            }
        } else {
            AxisState::Exhausted {
                attempts: attempt,
                last: failure,
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AxisState::Decoded { .. } | AxisState::Exhausted { .. } | AxisState::Aborted { .. }
        )
    }
}

/// 对已收集的字节做判定：不足 7 字节为超时，否则交给帧校验
pub fn classify_response(
    bytes: &[u8],
    address: DeviceAddress,
    axis: Axis,
) -> Result<u16, AttemptFailure> {
    if bytes.len() < FRAME_LEN {
        return Err(AttemptFailure::TimedOut {
            received: bytes.len(),
        });
    }
    parse_response(&bytes[..FRAME_LEN], address, axis).map_err(AttemptFailure::Malformed)
}

/// 角度查询引擎
///
/// 只保存"最近一次成功读数"，任何后续失败都不会回滚它。
#[derive(Debug, Default)]
pub struct QueryEngine {
    last_horizontal: Option<AxisReading>,
    last_vertical: Option<AxisReading>,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 最近一次成功的（水平，垂直）角度
    pub fn last_angles(&self) -> (Option<f64>, Option<f64>) {
        (
            self.last_horizontal.map(|r| r.degrees),
            self.last_vertical.map(|r| r.degrees),
        )
    }

    pub fn last_reading(&self, axis: Axis) -> Option<AxisReading> {
        match axis {
            Axis::Horizontal => self.last_horizontal,
            Axis::Vertical => self.last_vertical,
        }
    }

    /// 执行一次完整查询周期：水平轴 -> 间隔 -> 垂直轴
    ///
    /// 水平轴出现致命串口错误时不再查询垂直轴。
    pub fn query_cycle(
        &mut self,
        transport: &mut impl Transport,
        config: &QueryConfig,
    ) -> QueryOutcome {
        let horizontal = self.query_axis(transport, config, Axis::Horizontal);

        let vertical = match &horizontal.result {
            Err(failure) if failure.is_fatal() => AxisOutcome {
                axis: Axis::Vertical,
                result: Err(failure.clone()),
                attempts: 0,
                tx: Vec::new(),
                rx: Vec::new(),
            },
            _ => {
                spin_sleep::sleep(config.inter_axis_delay);
                self.query_axis(transport, config, Axis::Vertical)
            },
        };

        QueryOutcome {
            device_address: config.device_address,
            vertical_mode: config.vertical_mode,
            horizontal,
            vertical,
            completed_at: Instant::now(),
        }
    }

    /// 单轴查询，直到解码成功、尝试用尽或串口出错
    pub fn query_axis(
        &mut self,
        transport: &mut impl Transport,
        config: &QueryConfig,
        axis: Axis,
    ) -> AxisOutcome {
        let frame = query_frame(config.device_address, axis);
        let max_attempts = config.max_attempts.max(1);
        let mut rx = Vec::new();
        let mut state = AxisState::Idle;

        while !state.is_terminal() {
            state = match state {
                AxisState::Idle => AxisState::Sent { attempt: 1 },

                AxisState::Sent { attempt } => {
                    let sent = transport
                        .clear_input_buffer()
                        .and_then(|_| transport.write(frame.as_bytes()));
                    match sent {
                        Ok(()) => {
                            trace!("{} query TX {}", axis, frame.to_hex());
                            AxisState::Awaiting { attempt }
                        },
                        Err(e) => AxisState::Aborted {
                            attempt,
                            fatal: e.is_fatal(),
                            message: e.to_string(),
                        },
                    }
                },

                AxisState::Awaiting { attempt } => {
                    match collect_response(transport, config.response_timeout, config.poll_interval) {
                        Ok(bytes) => {
                            trace!("{} query RX {}", axis, hex::encode_upper(&bytes));
                            let verdict = classify_response(&bytes, config.device_address, axis);
                            rx = bytes;
                            match verdict {
                                Ok(raw) => AxisState::Decoded { attempt, raw },
                                Err(AttemptFailure::TimedOut { received }) => {
                                    AxisState::TimedOut { attempt, received }
                                },
                                Err(AttemptFailure::Malformed(reason)) => {
                                    AxisState::Malformed { attempt, reason }
                                },
                            }
                        },
                        Err(e) => AxisState::Aborted {
                            attempt,
                            fatal: e.is_fatal(),
                            message: e.to_string(),
                        },
                    }
                },

                AxisState::TimedOut { attempt, received } => {
                    debug!(
                        "{} query attempt {}/{} timed out ({} bytes)",
                        axis, attempt, max_attempts, received
                    );
                    self.retry_or_exhaust(
                        attempt,
                        max_attempts,
                        AttemptFailure::TimedOut { received },
                        config,
                    )
                },

                AxisState::Malformed { attempt, reason } => {
                    debug!(
                        "{} query attempt {}/{} malformed: {}",
                        axis, attempt, max_attempts, reason
                    );
                    self.retry_or_exhaust(
                        attempt,
                        max_attempts,
                        AttemptFailure::Malformed(reason),
                        config,
                    )
                },

                // 终止状态不会进入循环体
                terminal => terminal,
            };
        }

        let (attempts, result) = match state {
            AxisState::Decoded { attempt, raw } => {
                let reading = AxisReading {
                    degrees: decode_angle(axis, raw, config.vertical_mode),
                    raw,
                };
                match axis {
                    Axis::Horizontal => self.last_horizontal = Some(reading),
                    Axis::Vertical => self.last_vertical = Some(reading),
                }
                (attempt, Ok(reading))
            },
            AxisState::Exhausted { attempts, last } => {
                warn!("{} query exhausted after {} attempts: {}", axis, attempts, last);
                (attempts, Err(AxisFailure::Exhausted { attempts, last }))
            },
            AxisState::Aborted {
                attempt,
                message,
                fatal,
            } => {
                error!("{} query aborted on attempt {}: {}", axis, attempt, message);
                (attempt, Err(AxisFailure::Io { message, fatal }))
            },
            other => unreachable!("non-terminal axis state after loop: {:?}", other),
        };

        AxisOutcome {
            axis,
            result,
            attempts,
            tx: frame.as_bytes().to_vec(),
            rx,
        }
    }

    fn retry_or_exhaust(
        &self,
        attempt: u32,
        max_attempts: u32,
        failure: AttemptFailure,
        config: &QueryConfig,
    ) -> AxisState {
        let next = AxisState::after_failure(attempt, max_attempts, failure);
        if matches!(next, AxisState::Sent { .. }) {
            spin_sleep::sleep(config.retry_delay);
        }
        next
    }
}

/// 在超时内累计读取，满 7 字节提前返回，结果截断为最多 7 字节
fn collect_response(
    transport: &mut impl Transport,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Vec<u8>, pelco_serial::SerialError> {
    let deadline = Instant::now() + timeout;
    let mut response = Vec::with_capacity(FRAME_LEN);

    loop {
        if transport.bytes_waiting()? > 0 {
            response.extend(transport.read_available()?);
            if response.len() >= FRAME_LEN {
                break;
            }
        }
        if Instant::now() >= deadline {
            break;
        }
        spin_sleep::sleep(poll_interval);
    }

    response.truncate(FRAME_LEN);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pelco_protocol::checksum;
    use pelco_serial::mock::MockTransport;

    fn fast_config() -> QueryConfig {
        QueryConfig {
            response_timeout: Duration::from_millis(5),
            inter_axis_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
            poll_interval: Duration::from_micros(200),
            ..QueryConfig::default()
        }
    }

    fn reply(cmd: u8, raw: u16) -> Vec<u8> {
        let [d1, d2] = raw.to_be_bytes();
        let body = [0x01, 0x00, cmd, d1, d2];
        let mut bytes = vec![0xFF];
        bytes.extend_from_slice(&body);
        bytes.push(checksum(&body));
        bytes
    }

    #[test]
    fn test_after_failure_transitions() {
        let failure = AttemptFailure::TimedOut { received: 0 };
        assert_eq!(
            AxisState::after_failure(1, 3, failure),
            AxisState::Sent { attempt: 2 }
        );
        assert_eq!(
            AxisState::after_failure(3, 3, failure),
            AxisState::Exhausted {
                attempts: 3,
                last: failure
            }
        );
    }

    #[test]
    fn test_classify_response() {
        let address = DeviceAddress::default();
        assert_eq!(
            classify_response(&[0xFF, 0x01, 0x00], address, Axis::Horizontal),
            Err(AttemptFailure::TimedOut { received: 3 })
        );
        assert_eq!(
            classify_response(&reply(0x59, 9000), address, Axis::Horizontal),
            Ok(9000)
        );
        assert!(matches!(
            classify_response(&reply(0x59, 9000), address, Axis::Vertical),
            Err(AttemptFailure::Malformed(MalformedReason::UnexpectedCommand { .. }))
        ));
    }

    #[test]
    fn test_full_cycle_success() {
        let mut transport = MockTransport::with_responder(|bytes| match bytes[3] {
            0x51 => Some(reply(0x59, 12000)),
            0x53 => Some(reply(0x5B, 31500)),
            _ => None,
        });
        let handle = transport.handle();
        let mut engine = QueryEngine::new();

        let outcome = engine.query_cycle(&mut transport, &fast_config());
        assert!(outcome.is_success());
        let sample = outcome.sample().unwrap();
        assert_eq!(sample.horizontal_deg, 120.0);
        assert_eq!(sample.vertical_deg, -45.0);
        assert_eq!(sample.vertical_raw, 31500);
        assert_eq!(outcome.horizontal.attempts, 1);
        assert_eq!(engine.last_angles(), (Some(120.0), Some(-45.0)));

        // 每次写入前都清空了输入缓冲区
        assert_eq!(handle.written().len(), 2);
        assert_eq!(handle.clear_count(), 2);
    }

    #[test]
    fn test_stale_bytes_are_cleared_before_write() {
        let mut transport = MockTransport::with_responder(|bytes| match bytes[3] {
            0x51 => Some(reply(0x59, 100)),
            _ => None,
        });
        transport.handle().inject(&[0x00, 0x11, 0x22]);
        let mut engine = QueryEngine::new();

        let outcome = engine.query_axis(&mut transport, &fast_config(), Axis::Horizontal);
        assert_eq!(outcome.reading().unwrap().raw, 100);
        assert_eq!(outcome.rx, reply(0x59, 100));
    }

    #[test]
    fn test_retry_then_success() {
        let mut calls = 0;
        let mut transport = MockTransport::with_responder(move |_| {
            calls += 1;
            if calls < 3 { None } else { Some(reply(0x59, 4500)) }
        });
        let mut engine = QueryEngine::new();

        let outcome = engine.query_axis(&mut transport, &fast_config(), Axis::Horizontal);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.degrees(), Some(45.0));
    }

    #[test]
    fn test_io_error_aborts_axis() {
        let mut transport = MockTransport::new();
        transport
            .handle()
            .fail_writes(Some(std::io::ErrorKind::BrokenPipe));
        let mut engine = QueryEngine::new();

        let outcome = engine.query_cycle(&mut transport, &fast_config());
        assert!(!outcome.is_success());
        assert!(outcome.has_fatal_io());
        assert_eq!(outcome.horizontal.attempts, 1);
        // 垂直轴没有再尝试
        assert_eq!(outcome.vertical.attempts, 0);
    }

    #[test]
    fn test_outcome_display() {
        let mut transport = MockTransport::with_responder(|bytes| match bytes[3] {
            0x51 => Some(reply(0x59, 12000)),
            _ => None,
        });
        let mut engine = QueryEngine::new();
        let outcome = engine.query_cycle(&mut transport, &fast_config());
        let text = outcome.to_string();
        assert!(text.contains("query failed"));
        assert!(text.contains("120.00"));
        assert!(text.contains("exhausted after 3 attempts"));
        assert!(text.contains("TX FF 01 00 53 00 00 54"));
    }
}
