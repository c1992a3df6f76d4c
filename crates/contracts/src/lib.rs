//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the notification router.
//! Business crates depend on this crate only, reverse dependencies are prohibited.
//!
//! ## Data Flow
//! - A `MessageSource` yields raw payloads
//! - Ingestion decodes them into `NotificationMessage`
//! - The dispatcher routes each message to the `ChannelSender` registered for its `ChannelId`
//! - Every attempt produces one `AuditRecord`, every discarded payload one `Rejection`

mod audit;
mod blueprint;
mod error;
mod message;
mod sender;
mod source;

pub use audit::*;
pub use blueprint::*;
pub use error::*;
pub use message::{ChannelId, NotificationMessage};
pub use sender::{ChannelSender, DeliveryError, LocalChannelSender};
pub use source::{LocalMessageSource, MessageSource};
