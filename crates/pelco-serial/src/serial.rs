//! 基于 `serialport` 的真实串口实现

use crate::{SerialError, Transport};
use serialport::{ClearBuffer, SerialPort, SerialPortType};
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 串口读超时（`read_available` 只读已就绪的字节，超时只是兜底）
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// 串口信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub description: String,
}

/// 列出系统中的串口
pub fn available_ports() -> Result<Vec<PortInfo>, SerialError> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let description = match &p.port_type {
                SerialPortType::UsbPort(usb) => usb
                    .product
                    .clone()
                    .or_else(|| usb.manufacturer.clone())
                    .unwrap_or_else(|| format!("USB {:04X}:{:04X}", usb.vid, usb.pid)),
                SerialPortType::PciPort => "PCI".to_string(),
                SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                SerialPortType::Unknown => p.port_name.clone(),
            };
            PortInfo {
                name: p.port_name,
                description,
            }
        })
        .collect())
}

/// 串口传输
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    name: String,
    baud_rate: u32,
}

impl SerialTransport {
    /// 打开串口
    ///
    /// # 错误
    /// - `SerialError::Port`: 端口不存在、被占用或参数不支持
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, SerialError> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()?;
        info!("Serial port opened: {} @ {}bps", port_name, baud_rate);
        Ok(Self {
            port: Some(port),
            name: port_name.to_string(),
            baud_rate,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, SerialError> {
        self.port.as_mut().ok_or(SerialError::NotOpen)
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        let port = self.port_mut()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn bytes_waiting(&mut self) -> Result<usize, SerialError> {
        Ok(self.port_mut()?.bytes_to_read()? as usize)
    }

    fn read_available(&mut self) -> Result<Vec<u8>, SerialError> {
        let waiting = self.bytes_waiting()?;
        if waiting == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; waiting];
        match self.port_mut()?.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            },
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn clear_input_buffer(&mut self) -> Result<(), SerialError> {
        self.port_mut()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.flush() {
                warn!("Failed to flush {} before close: {}", self.name, e);
            }
            debug!("Serial port closed: {}", self.name);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}
