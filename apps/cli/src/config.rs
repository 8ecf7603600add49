//! 应用配置（`<config_dir>/pelco/config.toml`）

use anyhow::{Context, Result};
use pelco_protocol::VerticalAngleMode;
use pelco_serial::DEFAULT_BAUD_RATE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置目录
fn config_dir() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("pelco");
    Ok(path)
}

/// 配置文件路径
pub fn config_file() -> Result<PathBuf> {
    let mut path = config_dir()?;
    path.push("config.toml");
    Ok(path)
}

/// CLI 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 默认串口
    pub port: Option<String>,
    pub baud_rate: u32,
    /// 设备地址（十六进制文本，如 `0x01`）
    pub address: String,
    pub vertical_mode: VerticalAngleMode,
    pub query_interval_ms: u64,
    pub tracking_interval_ms: u64,
    pub threshold_deg: f64,
    pub azimuth_delta_deg: f64,
    pub elevation_delta_deg: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            address: "0x01".to_string(),
            vertical_mode: VerticalAngleMode::Auto,
            query_interval_ms: 380,
            tracking_interval_ms: 1000,
            threshold_deg: 0.1,
            azimuth_delta_deg: 0.0,
            elevation_delta_deg: 0.0,
        }
    }
}

impl AppConfig {
    /// 从默认路径加载（文件不存在时返回默认配置）
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).context("读取配置文件失败")?;
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("创建配置目录失败")?;
        }
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, format!("# PELCO-D CLI Configuration\n\n{}", content))
            .context("写入配置文件失败")?;
        Ok(())
    }
}
