//! RouterBlueprint - Config Loader 输出
//!
//! 描述完整的路由配置：投递超时、摄取并发、发送器列表。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的路由配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 分发设置
    #[serde(default)]
    pub dispatch: DispatchSettings,

    /// 摄取设置
    #[serde(default)]
    pub ingestion: IngestionSettings,

    /// 发送器列表
    #[serde(default)]
    pub senders: Vec<SenderConfig>,
}

/// 分发设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// 单次投递超时 (毫秒)，必须 > 0
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            delivery_timeout_ms: default_delivery_timeout_ms(),
        }
    }
}

fn default_delivery_timeout_ms() -> u64 {
    10_000
}

/// 摄取设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionSettings {
    /// 并发 worker 数量
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// 待处理 payload 队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    100
}

fn default_max_in_flight() -> usize {
    8
}

/// 发送器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    /// 发送器名称 (唯一)
    pub name: String,

    /// 服务的渠道标识 (大小写不敏感，唯一)
    pub channel: String,

    /// 发送器类型
    pub kind: SenderKind,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 同时进行中的投递上限
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// 发送器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    /// 日志输出
    Log,
    /// 文件发件箱 (JSON lines)
    File,
    /// UDP 中继
    Udp,
    /// Twilio 短信 / WhatsApp
    Twilio,
    /// SMTP 邮件
    Smtp,
}

impl SenderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::File => "file",
            Self::Udp => "udp",
            Self::Twilio => "twilio",
            Self::Smtp => "smtp",
        }
    }
}
