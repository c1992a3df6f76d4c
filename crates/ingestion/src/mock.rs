//! Mock 消息源
//!
//! 按顺序发出固定的 payload 列表，用于测试和演示。

use std::collections::VecDeque;
use std::time::Duration;

use contracts::{ContractError, MessageSource};
use serde_json::json;
use tracing::trace;

/// Mock 消息源
pub struct MockMessageSource {
    name: String,
    payloads: VecDeque<String>,
    interval: Option<Duration>,
    emitted: u64,
}

impl MockMessageSource {
    /// 创建新的 Mock 消息源
    pub fn new<I, S>(payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: "mock".to_string(),
            payloads: payloads.into_iter().map(Into::into).collect(),
            interval: None,
            emitted: 0,
        }
    }

    /// 生成 `count` 条合法 payload，渠道在 `channels` 中轮换
    pub fn generated(count: usize, channels: &[&str]) -> Self {
        let payloads = (0..count).map(|i| {
            let channel = channels.get(i % channels.len().max(1)).copied().unwrap_or("LOG");
            json!({
                "type": channel,
                "to": format!("recipient-{i}"),
                "body": format!("message {i}"),
            })
            .to_string()
        });
        Self::new(payloads)
    }

    /// 每条 payload 之间的间隔
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 剩余 payload 数量
    pub fn remaining(&self) -> usize {
        self.payloads.len()
    }
}

impl MessageSource for MockMessageSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_payload(&mut self) -> Result<Option<String>, ContractError> {
        if self.emitted > 0 {
            if let Some(interval) = self.interval {
                tokio::time::sleep(interval).await;
            }
        }

        let payload = self.payloads.pop_front();
        if payload.is_some() {
            self.emitted += 1;
            trace!(source = %self.name, emitted = self.emitted, "mock payload emitted");
        }
        Ok(payload)
    }
}
