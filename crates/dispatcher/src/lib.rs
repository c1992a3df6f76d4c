//! # Dispatcher
//!
//! 通知路由与投递模块。
//!
//! 负责：
//! - 构建渠道发送器注册表 (启动时校验重复渠道)
//! - 按渠道路由 `NotificationMessage` 到唯一的发送器
//! - 隔离慢发送器 / 失败发送器，投递超时即失败，不阻塞主链路
//! - 每次投递尝试产生一条审计记录

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod mock;
pub mod registry;
pub mod senders;

pub use contracts::{ChannelSender, NotificationMessage};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherConfig};
pub use error::{DispatchError, DispatcherError};
pub use handle::{HandleOptions, SenderHandle};
pub use metrics::{MetricsSnapshot, SenderMetrics};
pub use mock::{MockBehavior, MockSender};
pub use registry::{create_registry, RegistryBuilder, SenderRegistry};
pub use senders::{FileSender, LogSender, SmtpSender, TwilioSender, UdpSender};
