//! 测试用发送器
//!
//! `MockSender` 记录收到的消息，并按 `MockBehavior` 模拟成功、失败、慢速和崩溃。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{ChannelSender, DeliveryError, NotificationMessage};

/// 模拟行为
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    /// 立即成功
    Succeed,
    /// 立即以 `Rejected` 失败
    Fail(String),
    /// 等待后成功
    Delay(Duration),
    /// 投递时 panic
    Panic,
}

/// 测试用发送器
///
/// Clone 共享同一份投递记录，可在交给注册表之后继续断言。
#[derive(Debug, Clone)]
pub struct MockSender {
    name: String,
    identifier: String,
    behavior: MockBehavior,
    deliveries: Arc<Mutex<Vec<NotificationMessage>>>,
    attempts: Arc<AtomicU64>,
}

impl MockSender {
    /// 创建总是成功的发送器
    pub fn new(name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier: identifier.into(),
            behavior: MockBehavior::Succeed,
            deliveries: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 创建总是失败的发送器
    pub fn failing(
        name: impl Into<String>,
        identifier: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(name, identifier).with_behavior(MockBehavior::Fail(reason.into()))
    }

    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// 成功投递的消息 (按完成顺序)
    pub fn deliveries(&self) -> Vec<NotificationMessage> {
        self.deliveries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.deliveries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// 投递尝试次数 (含失败)
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    fn push(&self, message: &NotificationMessage) {
        self.deliveries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.clone());
    }
}

impl ChannelSender for MockSender {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);

        match &self.behavior {
            MockBehavior::Succeed => {}
            MockBehavior::Fail(reason) => return Err(DeliveryError::rejected(reason.clone())),
            MockBehavior::Delay(delay) => tokio::time::sleep(*delay).await,
            MockBehavior::Panic => panic!("mock sender '{}' panicked", self.name),
        }

        self.push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_deliveries() {
        let sender = MockSender::new("mock", "EMAIL");
        let msg = NotificationMessage::new("EMAIL", "a@b.com", None, "hi").unwrap();

        sender.deliver(&msg).await.unwrap();
        let clone = sender.clone();
        clone.deliver(&msg).await.unwrap();

        assert_eq!(sender.delivered_count(), 2);
        assert_eq!(sender.attempts(), 2);
        assert_eq!(sender.deliveries()[0].body(), "hi");
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let sender = MockSender::failing("mock", "SMS", "carrier down");
        let msg = NotificationMessage::new("SMS", "+1555", None, "hi").unwrap();

        let err = sender.deliver(&msg).await.unwrap_err();
        assert_eq!(err, DeliveryError::rejected("carrier down"));
        assert_eq!(sender.delivered_count(), 0);
        assert_eq!(sender.attempts(), 1);
    }
}
