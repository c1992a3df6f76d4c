//! Ingestion 错误类型

use contracts::{ContractError, ErrorKind, Rejection};
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// payload 无法解析 (非 JSON、缺字段、类型错误)
    #[error("malformed payload: {message}")]
    MalformedPayload {
        /// 错误消息
        message: String,
    },

    /// payload 可解析但不满足消息不变量
    #[error("invalid message: {message}")]
    InvalidMessage {
        /// 原始渠道 (如果已解析出)
        channel: Option<String>,
        /// 错误消息
        message: String,
    },

    /// 分发任务异常终止 (例如发送器 panic)
    #[error("dispatch aborted: {message}")]
    DispatchAborted {
        /// 错误消息
        message: String,
    },

    /// 消息源读取失败
    #[error("source '{source_name}' failed: {message}")]
    Source {
        /// 消息源名称
        source_name: String,
        /// 错误消息
        message: String,
    },

    /// 内部队列已关闭
    #[error("ingestion queue closed")]
    ChannelClosed,
}

impl IngestionError {
    /// 创建格式错误
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    /// 错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedPayload { .. } => ErrorKind::MalformedPayload,
            Self::InvalidMessage { .. } => ErrorKind::InvalidMessage,
            Self::DispatchAborted { .. } => ErrorKind::DeliveryFailure,
            Self::Source { .. } | Self::ChannelClosed => ErrorKind::Configuration,
        }
    }

    /// 转换为丢弃报告 (仅 payload 级错误)
    pub fn to_rejection(&self) -> Option<Rejection> {
        match self {
            Self::MalformedPayload { message } => Some(Rejection::new(
                ErrorKind::MalformedPayload,
                message.clone(),
                None,
            )),
            Self::InvalidMessage { channel, message } => Some(Rejection::new(
                ErrorKind::InvalidMessage,
                message.clone(),
                channel.clone(),
            )),
            _ => None,
        }
    }
}

impl From<ContractError> for IngestionError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::InvalidMessage { message } => Self::InvalidMessage {
                channel: None,
                message,
            },
            ContractError::UnreadablePayload { message, .. } => Self::MalformedPayload { message },
            ContractError::SourceRead {
                source_name,
                message,
            } => Self::Source {
                source_name,
                message,
            },
            other => Self::Source {
                source_name: "unknown".to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
