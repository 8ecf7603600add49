//! 配置管理命令
//!
//! 用于管理 CLI 配置（串口、地址、查询与跟踪参数等）

use crate::config::{AppConfig, config_file};
use crate::validation::{
    clamp_query_interval, defaults_summary, parse_address, parse_offset, parse_query_interval,
    parse_threshold, parse_tracking_interval, validate_baud_rate,
};
use anyhow::Result;
use clap::Subcommand;
use pelco_protocol::VerticalAngleMode;
use pelco_tracking::config::clamp_tracking_interval;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set(ConfigSetArgs),

    /// 获取配置项
    Get {
        /// 配置项名称
        #[arg(default_value = "all")]
        key: String,
    },

    /// 检查配置
    Check,
}

/// `config set` 参数（数值以文本接收，无效时回退并警告）
#[derive(clap::Args, Debug, Default)]
pub struct ConfigSetArgs {
    /// 默认串口
    #[arg(short, long)]
    pub port: Option<String>,

    /// 波特率
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// 设备地址（十六进制）
    #[arg(short, long)]
    pub address: Option<String>,

    /// 垂直角度模式：direct / negative / auto
    #[arg(long)]
    pub vertical_mode: Option<VerticalAngleMode>,

    /// 角度查询间隔（毫秒，50-5000）
    #[arg(long)]
    pub query_interval: Option<String>,

    /// 跟踪数据间隔（毫秒，100-10000）
    #[arg(long)]
    pub tracking_interval: Option<String>,

    /// 位置变化阈值（度）
    #[arg(long)]
    pub threshold: Option<String>,

    /// 方位角偏移（度）
    #[arg(long, allow_hyphen_values = true)]
    pub az_delta: Option<String>,

    /// 俯仰角偏移（度）
    #[arg(long, allow_hyphen_values = true)]
    pub el_delta: Option<String>,
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Set(args) => {
                let mut config = AppConfig::load()?;
                apply_set(&mut config, &args)?;
                config.save()?;
                Ok(())
            },
            ConfigCommand::Get { key } => {
                let config = AppConfig::load()?;
                println!("{}", get_value(&config, &key)?);
                Ok(())
            },
            ConfigCommand::Check => Self::check_(),
        }
    }

    fn check_() -> Result<()> {
        let path = config_file()?;
        println!("配置文件: {}", path.display());
        let config = AppConfig::load()?;
        println!("{}", get_value(&config, "all")?);

        let problems = check_config(&config);
        if problems.is_empty() {
            println!("✅ 配置有效");
        } else {
            for problem in &problems {
                println!("⚠️  {}", problem);
            }
            println!("允许范围: {}", defaults_summary());
        }
        Ok(())
    }
}

/// 把 `config set` 参数写入配置
///
/// 地址和波特率无效时报错且不修改配置；数值参数无效时保留原值。
pub fn apply_set(config: &mut AppConfig, args: &ConfigSetArgs) -> Result<()> {
    if let Some(address) = &args.address {
        let address = parse_address(address)?;
        config.address = address.to_string();
        println!("✅ 设置设备地址: {}", config.address);
    }
    if let Some(baud) = args.baud {
        config.baud_rate = validate_baud_rate(baud)?;
        println!("✅ 设置波特率: {}", baud);
    }
    if let Some(port) = &args.port {
        config.port = Some(port.clone());
        println!("✅ 设置默认串口: {}", port);
    }
    if let Some(mode) = args.vertical_mode {
        config.vertical_mode = mode;
        println!("✅ 设置垂直角度模式: {}", mode);
    }
    if let Some(text) = &args.query_interval {
        config.query_interval_ms = parse_query_interval(text, config.query_interval_ms);
        println!("✅ 设置查询间隔: {} ms", config.query_interval_ms);
    }
    if let Some(text) = &args.tracking_interval {
        config.tracking_interval_ms = parse_tracking_interval(text, config.tracking_interval_ms);
        println!("✅ 设置跟踪间隔: {} ms", config.tracking_interval_ms);
    }
    if let Some(text) = &args.threshold {
        config.threshold_deg = parse_threshold(text, config.threshold_deg);
        println!("✅ 设置阈值: {}°", config.threshold_deg);
    }
    if let Some(text) = &args.az_delta {
        config.azimuth_delta_deg = parse_offset("azimuth_delta", text, config.azimuth_delta_deg);
        println!("✅ 设置方位角偏移: {}°", config.azimuth_delta_deg);
    }
    if let Some(text) = &args.el_delta {
        config.elevation_delta_deg =
            parse_offset("elevation_delta", text, config.elevation_delta_deg);
        println!("✅ 设置俯仰角偏移: {}°", config.elevation_delta_deg);
    }
    Ok(())
}

pub fn get_value(config: &AppConfig, key: &str) -> Result<String> {
    let value = match key {
        "port" => config.port.clone().unwrap_or_else(|| "(未设置)".to_string()),
        "baud_rate" | "baud" => config.baud_rate.to_string(),
        "address" => config.address.clone(),
        "vertical_mode" => config.vertical_mode.to_string(),
        "query_interval_ms" => config.query_interval_ms.to_string(),
        "tracking_interval_ms" => config.tracking_interval_ms.to_string(),
        "threshold_deg" => config.threshold_deg.to_string(),
        "azimuth_delta_deg" => config.azimuth_delta_deg.to_string(),
        "elevation_delta_deg" => config.elevation_delta_deg.to_string(),
        "all" => format!(
            "PELCO-D CLI 配置:\n  串口: {}\n  波特率: {}\n  地址: {}\n  垂直模式: {}\n  查询间隔: {} ms\n  跟踪间隔: {} ms\n  阈值: {}°\n  偏移: az {}° el {}°",
            config.port.as_deref().unwrap_or("(未设置)"),
            config.baud_rate,
            config.address,
            config.vertical_mode,
            config.query_interval_ms,
            config.tracking_interval_ms,
            config.threshold_deg,
            config.azimuth_delta_deg,
            config.elevation_delta_deg
        ),
        other => anyhow::bail!("未知配置项: {}", other),
    };
    Ok(value)
}

/// 列出配置问题（手工编辑的文件可能越界）
pub fn check_config(config: &AppConfig) -> Vec<String> {
    let mut problems = Vec::new();
    if config.port.is_none() {
        problems.push("未设置默认串口".to_string());
    }
    if let Err(e) = validate_baud_rate(config.baud_rate) {
        problems.push(e.to_string());
    }
    if let Err(e) = parse_address(&config.address) {
        problems.push(e.to_string());
    }
    if clamp_query_interval(config.query_interval_ms) != config.query_interval_ms {
        problems.push(format!("query_interval_ms {} 超出范围", config.query_interval_ms));
    }
    if clamp_tracking_interval(config.tracking_interval_ms) != config.tracking_interval_ms {
        problems.push(format!(
            "tracking_interval_ms {} 超出范围",
            config.tracking_interval_ms
        ));
    }
    if config.threshold_deg.is_nan() || config.threshold_deg <= 0.0 {
        problems.push(format!("threshold_deg {} 必须大于 0", config.threshold_deg));
    }
    problems
}
