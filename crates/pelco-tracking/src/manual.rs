//! 手动控制
//!
//! 方向运动、停止和"转到"指定角度。跟踪进行中时拒绝运动类命令，
//! 停止命令始终允许。

use crate::TrackingError;
use crate::session::TrackingSession;
use crate::sink::CommandSink;
use pelco_driver::LabeledCommand;
use pelco_protocol::{
    DEFAULT_SPEED, Direction, move_frame, set_horizontal_angle, set_vertical_angle, stop,
};
use smallvec::smallvec;
use tracing::info;

/// 手动控制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualControl {
    speed: u8,
}

impl Default for ManualControl {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
        }
    }
}

impl ManualControl {
    pub fn new(speed: u8) -> Self {
        Self { speed }
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// 开始向指定方向运动（直到收到停止命令）
    pub fn start_move(
        &self,
        sink: &impl CommandSink,
        session: &TrackingSession,
        direction: Direction,
    ) -> Result<(), TrackingError> {
        ensure_idle(session)?;
        let frame = move_frame(sink.address(), direction, self.speed);
        sink.send_command(LabeledCommand::new(
            frame,
            format!("Move {}", direction.label()),
        ))?;
        Ok(())
    }

    pub fn stop(&self, sink: &impl CommandSink) -> Result<(), TrackingError> {
        sink.send_command(LabeledCommand::new(stop(sink.address()), "Stop"))?;
        Ok(())
    }

    /// 转到指定角度：停止、水平绝对角度、垂直绝对角度
    ///
    /// 角度越界时在入队任何帧之前返回错误。
    pub fn goto(
        &self,
        sink: &impl CommandSink,
        session: &TrackingSession,
        azimuth: f64,
        elevation: f64,
    ) -> Result<(), TrackingError> {
        ensure_idle(session)?;
        let address = sink.address();
        let burst = smallvec![
            LabeledCommand::new(stop(address), "Goto Stop"),
            LabeledCommand::new(set_horizontal_angle(address, azimuth)?, "Goto Set H"),
            LabeledCommand::new(set_vertical_angle(address, elevation)?, "Goto Set V"),
        ];
        sink.send_burst(burst)?;
        info!("Goto az {:.2}° el {:.2}°", azimuth, elevation);
        Ok(())
    }
}

fn ensure_idle(session: &TrackingSession) -> Result<(), TrackingError> {
    if session.is_active() {
        Err(TrackingError::TrackingActive)
    } else {
        Ok(())
    }
}
