//! 串口列表命令

use anyhow::{Context, Result};
use pelco_serial::available_ports;

pub fn execute() -> Result<()> {
    let ports = available_ports().context("枚举串口失败")?;
    if ports.is_empty() {
        println!("未找到串口");
        return Ok(());
    }
    println!("可用串口:");
    for port in ports {
        println!("  {:<20} {}", port.name, port.description);
    }
    Ok(())
}
