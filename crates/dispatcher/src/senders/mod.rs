//! Built-in channel senders

mod file;
mod log;
mod smtp;
mod twilio;
mod udp;

pub use file::{FileSender, FileSenderConfig};
pub use log::LogSender;
pub use smtp::{SmtpConfig, SmtpSender};
pub use twilio::{TwilioConfig, TwilioMode, TwilioSender};
pub use udp::{RelayFormat, UdpSender, UdpSenderConfig};
