//! Mock 传输（无硬件依赖）
//!
//! 每次 `write` 都会交给应答函数（responder），其返回值被追加到输入缓冲区，
//! 用于模拟设备应答、静默（超时）和损坏帧。[`MockHandle`] 与传输共享状态，
//! 可以在传输被移动到调度线程后继续检查写出的帧或注入故障。

use crate::{SerialError, Transport};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

#[derive(Default)]
struct MockState {
    written: Vec<Vec<u8>>,
    rx: VecDeque<u8>,
    clears: usize,
    fail_writes: Option<io::ErrorKind>,
    closed: bool,
}

/// Mock 传输
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    responder: Option<Responder>,
}

/// Mock 传输的共享句柄
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// 永不应答的传输（所有查询都会超时）
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            responder: None,
        }
    }

    /// 使用应答函数创建传输
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            responder: Some(Box::new(responder)),
        }
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: self.state.clone(),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(SerialError::NotOpen);
            }
            if let Some(kind) = state.fail_writes {
                return Err(io::Error::from(kind).into());
            }
            state.written.push(bytes.to_vec());
        }

        if let Some(responder) = self.responder.as_mut()
            && let Some(reply) = responder(bytes)
        {
            self.state.lock().rx.extend(reply);
        }
        Ok(())
    }

    fn bytes_waiting(&mut self) -> Result<usize, SerialError> {
        let state = self.state.lock();
        if state.closed {
            return Err(SerialError::NotOpen);
        }
        Ok(state.rx.len())
    }

    fn read_available(&mut self) -> Result<Vec<u8>, SerialError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SerialError::NotOpen);
        }
        Ok(state.rx.drain(..).collect())
    }

    fn clear_input_buffer(&mut self) -> Result<(), SerialError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SerialError::NotOpen);
        }
        state.rx.clear();
        state.clears += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().closed = true;
    }

    fn is_open(&self) -> bool {
        !self.state.lock().closed
    }
}

impl MockHandle {
    /// 已写出的全部字节序列（按写入顺序）
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().written.clone()
    }

    /// 只保留满足条件的写入
    pub fn written_matching(&self, pred: impl Fn(&[u8]) -> bool) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .written
            .iter()
            .filter(|w| pred(w))
            .cloned()
            .collect()
    }

    /// 向输入缓冲区注入字节（模拟未经请求的线路噪声）
    pub fn inject(&self, bytes: &[u8]) {
        self.state.lock().rx.extend(bytes.iter().copied());
    }

    pub fn clear_count(&self) -> usize {
        self.state.lock().clears
    }

    /// 之后的写入全部以指定错误失败；`None` 恢复正常
    pub fn fail_writes(&self, kind: Option<io::ErrorKind>) {
        self.state.lock().fail_writes = kind;
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
