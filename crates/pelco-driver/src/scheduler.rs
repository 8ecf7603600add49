//! 设备 IO 调度循环
//!
//! 单个后台线程独占串口，每轮迭代依次：
//!
//! 1. 命令队列非空时取出**一个**命令帧写出，发布 `CommandSent`；
//! 2. 已连接且距上次查询超过 `query_interval` 时同步执行一次完整查询周期，
//!    发布 `AngleResult`，无论成败都更新上次查询时间；
//! 3. 休眠 `command_poll_interval`。
//!
//! 查询周期不可中断：查询期间入队的命令等待周期结束后再发送，
//! 停止请求也只在迭代之间检查。

use crate::command::{CommandBurst, LabeledCommand};
use crate::error::DriverError;
use crate::event::{DeviceEvent, DeviceEventKind};
use crate::query::{AngleSample, QueryConfig, QueryEngine, QueryOutcome};
use arc_swap::ArcSwapOption;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use pelco_protocol::{CommandFrame, DeviceAddress, VerticalAngleMode, stop};
use pelco_serial::Transport;
use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 事件通道容量（监听者跟不上时丢弃新事件）
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// 断开前发送停止帧后的等待时间
pub const DISCONNECT_SETTLE: Duration = Duration::from_millis(100);

/// 调度配置（运行时可调，每轮迭代读取一次）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchedulerConfig {
    /// 角度查询间隔（调用方负责限制在 50ms..=5000ms）
    pub query_interval: Duration,
    /// 每轮迭代后的休眠
    pub command_poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            query_interval: Duration::from_millis(380),
            command_poll_interval: Duration::from_millis(10),
        }
    }
}

/// 调度线程与句柄之间共享的状态
pub(crate) struct SharedState {
    scheduler_config: RwLock<SchedulerConfig>,
    query_config: RwLock<QueryConfig>,
    connected: AtomicBool,
    running: AtomicBool,
    disconnect_requested: AtomicBool,
    last_sample: ArcSwapOption<AngleSample>,
    last_outcome: ArcSwapOption<QueryOutcome>,
    last_sent: ArcSwapOption<LabeledCommand>,
}

impl SharedState {
    pub(crate) fn new(scheduler_config: SchedulerConfig, query_config: QueryConfig) -> Self {
        Self {
            scheduler_config: RwLock::new(scheduler_config),
            query_config: RwLock::new(query_config),
            connected: AtomicBool::new(true),
            running: AtomicBool::new(true),
            disconnect_requested: AtomicBool::new(false),
            last_sample: ArcSwapOption::empty(),
            last_outcome: ArcSwapOption::empty(),
            last_sent: ArcSwapOption::empty(),
        }
    }
}

// ============================================================================
// 调度循环
// ============================================================================

/// 调度循环（运行在 IO 线程上，独占串口）
pub(crate) struct SchedulerLoop<T: Transport> {
    transport: T,
    engine: QueryEngine,
    commands: Receiver<LabeledCommand>,
    events: Sender<DeviceEvent>,
    shared: Arc<SharedState>,
    last_query: Option<Instant>,
}

impl<T: Transport> SchedulerLoop<T> {
    pub(crate) fn new(
        transport: T,
        commands: Receiver<LabeledCommand>,
        events: Sender<DeviceEvent>,
        shared: Arc<SharedState>,
    ) -> Self {
        Self {
            transport,
            engine: QueryEngine::new(),
            commands,
            events,
            shared,
            last_query: None,
        }
    }

    /// 运行直到 `running` 被清除
    ///
    /// 退出时若有未处理的断开请求则按断开流程发送停止帧，否则直接关闭串口，
    /// 不打断设备正在执行的绝对位置命令。
    pub(crate) fn run(mut self) {
        info!("Scheduler loop started");
        while self.shared.running.load(Ordering::Acquire) {
            self.step(Instant::now());
            let quantum = self.shared.scheduler_config.read().command_poll_interval;
            spin_sleep::sleep(quantum);
        }
        if self.shared.disconnect_requested.swap(false, Ordering::AcqRel) {
            self.shutdown_transport();
        } else if self.transport.is_open() {
            self.transport.close();
            self.shared.connected.store(false, Ordering::Release);
        }
        info!("Scheduler loop stopped");
    }

    /// 单轮迭代（不含休眠）
    pub(crate) fn step(&mut self, now: Instant) {
        if self.shared.disconnect_requested.swap(false, Ordering::AcqRel) {
            self.shutdown_transport();
        }

        if !self.shared.connected.load(Ordering::Acquire) {
            self.drop_pending();
            return;
        }

        if let Ok(command) = self.commands.try_recv() {
            self.dispatch(command);
        }

        let interval = self.shared.scheduler_config.read().query_interval;
        let due = self
            .last_query
            .is_none_or(|last| now.saturating_duration_since(last) >= interval);
        if due && self.shared.connected.load(Ordering::Acquire) {
            self.run_query();
            self.last_query = Some(now);
        }
    }

    fn dispatch(&mut self, command: LabeledCommand) {
        match self.transport.write(command.frame.as_bytes()) {
            Ok(()) => {
                trace!("TX {} [{}]", command.frame.to_hex(), command.label);
                self.publish(DeviceEventKind::CommandSent {
                    frame: command.frame,
                    label: command.label.clone(),
                });
                self.shared.last_sent.store(Some(Arc::new(command)));
            },
            Err(e) => {
                error!("Failed to send {} [{}]: {}", command.frame.to_hex(), command.label, e);
                self.publish(DeviceEventKind::Error {
                    message: format!("send '{}' failed: {}", command.label, e),
                });
                if e.is_fatal() {
                    self.go_idle("transport lost while sending");
                }
            },
        }
    }

    fn run_query(&mut self) {
        let config = self.shared.query_config.read().clone();
        let outcome = self.engine.query_cycle(&mut self.transport, &config);

        if let Some(sample) = outcome.sample() {
            debug!(
                "Angles: H {:.2}° V {:.2}°",
                sample.horizontal_deg, sample.vertical_deg
            );
            self.shared.last_sample.store(Some(Arc::new(sample)));
        } else {
            debug!("Query cycle failed");
        }

        let fatal = outcome.has_fatal_io();
        self.shared.last_outcome.store(Some(Arc::new(outcome.clone())));
        self.publish(DeviceEventKind::AngleResult(outcome));

        if fatal {
            self.go_idle("transport lost while querying");
        }
    }

    /// 发送停止帧，等待设备响应后关闭串口
    fn shutdown_transport(&mut self) {
        if self.transport.is_open() {
            let address = self.shared.query_config.read().device_address;
            let frame = stop(address);
            match self.transport.write(frame.as_bytes()) {
                Ok(()) => {
                    trace!("TX {} [Stop]", frame.to_hex());
                    self.publish(DeviceEventKind::CommandSent {
                        frame,
                        label: Cow::Borrowed("Stop"),
                    });
                    spin_sleep::sleep(DISCONNECT_SETTLE);
                },
                Err(e) => warn!("Failed to send stop frame before disconnect: {}", e),
            }
            self.transport.close();
        }

        self.shared.connected.store(false, Ordering::Release);
        self.drop_pending();
        info!("Disconnected");
        self.publish(DeviceEventKind::ConnectionChanged { connected: false });
    }

    /// 串口失效：停止查询，关闭端口，进入空闲
    fn go_idle(&mut self, reason: &str) {
        error!("{}, scheduler going idle", reason);
        self.shared.connected.store(false, Ordering::Release);
        self.transport.close();
        self.publish(DeviceEventKind::Error {
            message: reason.to_string(),
        });
        self.publish(DeviceEventKind::ConnectionChanged { connected: false });
    }

    fn drop_pending(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            warn!(
                "Dropping {} [{}]: not connected",
                command.frame.to_hex(),
                command.label
            );
        }
    }

    fn publish(&self, kind: DeviceEventKind) {
        let name = kind.name();
        match self.events.try_send(DeviceEvent::now(kind)) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => trace!("Event channel full, dropping {}", name),
            Err(TrySendError::Disconnected(_)) => {},
        }
    }
}

// ============================================================================
// 对外句柄
// ============================================================================

/// 调度器句柄
///
/// 持有命令队列发送端和共享状态；Drop 时通知 IO 线程退出并等待其结束。
pub struct Scheduler {
    cmd_tx: Sender<LabeledCommand>,
    event_tx: Sender<DeviceEvent>,
    event_rx: Receiver<DeviceEvent>,
    shared: Arc<SharedState>,
    io_thread: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// 启动调度线程
    pub fn spawn<T>(transport: T, query_config: QueryConfig, scheduler_config: SchedulerConfig) -> Self
    where
        T: Transport + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(SharedState::new(scheduler_config, query_config));

        let scheduler_loop = SchedulerLoop::new(transport, cmd_rx, event_tx.clone(), shared.clone());
        let io_thread = spawn(move || scheduler_loop.run());

        Self {
            cmd_tx,
            event_tx,
            event_rx,
            shared,
            io_thread: Some(io_thread),
        }
    }

    /// 将命令帧加入发送队列
    ///
    /// # 错误
    /// - `DriverError::NotConnected`: 已断开
    /// - `DriverError::ChannelClosed`: 调度线程已退出
    pub fn send_command(&self, command: LabeledCommand) -> Result<(), DriverError> {
        if !self.is_connected() {
            return Err(DriverError::NotConnected);
        }
        self.cmd_tx
            .send(command)
            .map_err(|_| DriverError::ChannelClosed)
    }

    pub fn send_frame(
        &self,
        frame: CommandFrame,
        label: impl Into<Cow<'static, str>>,
    ) -> Result<(), DriverError> {
        self.send_command(LabeledCommand::new(frame, label))
    }

    /// 按顺序入队一组命令（连接状态只检查一次，保证整组入队）
    pub fn send_burst(&self, burst: CommandBurst) -> Result<(), DriverError> {
        if !self.is_connected() {
            return Err(DriverError::NotConnected);
        }
        for command in burst {
            self.cmd_tx
                .send(command)
                .map_err(|_| DriverError::ChannelClosed)?;
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        *self.shared.scheduler_config.read()
    }

    /// 修改查询间隔（下一轮迭代生效）
    pub fn set_query_interval(&self, interval: Duration) {
        self.shared.scheduler_config.write().query_interval = interval;
        debug!("Query interval set to {:?}", interval);
    }

    pub fn query_config(&self) -> QueryConfig {
        self.shared.query_config.read().clone()
    }

    pub fn vertical_mode(&self) -> VerticalAngleMode {
        self.shared.query_config.read().vertical_mode
    }

    pub fn set_vertical_mode(&self, mode: VerticalAngleMode) {
        self.shared.query_config.write().vertical_mode = mode;
        info!("Vertical angle mode set to {}", mode);
    }

    pub fn address(&self) -> DeviceAddress {
        self.shared.query_config.read().device_address
    }

    /// 修改设备地址（下一个查询周期生效，命令帧由调用方用新地址构建）
    pub fn set_address(&self, address: DeviceAddress) {
        self.shared.query_config.write().device_address = address;
        info!("Device address set to {}", address);
    }

    /// 事件接收端（可克隆，多个接收端竞争消费）
    pub fn events(&self) -> Receiver<DeviceEvent> {
        self.event_rx.clone()
    }

    /// 事件发送端（供跟踪循环发布 `TrackingUpdate`）
    pub fn event_sender(&self) -> Sender<DeviceEvent> {
        self.event_tx.clone()
    }

    /// 最近一次成功的角度样本
    pub fn last_sample(&self) -> Option<AngleSample> {
        self.shared.last_sample.load_full().map(|s| *s)
    }

    /// 最近一次查询周期结果（含失败）
    pub fn last_outcome(&self) -> Option<QueryOutcome> {
        self.shared
            .last_outcome
            .load_full()
            .map(|o| o.as_ref().clone())
    }

    /// 最近一次成功写出的命令
    pub fn last_sent(&self) -> Option<LabeledCommand> {
        self.shared.last_sent.load_full().map(|c| c.as_ref().clone())
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// 调度线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.io_thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 请求断开：调度线程发送停止帧、等待后关闭串口并进入空闲
    ///
    /// 调用后新命令立即被拒绝，队列中尚未发送的命令被丢弃。
    pub fn disconnect(&self) {
        if self.shared.connected.swap(false, Ordering::AcqRel) {
            self.shared.disconnect_requested.store(true, Ordering::Release);
            info!("Disconnect requested");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.io_thread.take()
            && handle.join().is_err()
        {
            error!("Scheduler thread panicked");
        }
    }
}
