//! Sender registry - channel identifier to sender resolution
//!
//! Built once at startup and read-only afterwards, so lookups from concurrent
//! dispatches need no locking.

use std::collections::HashMap;

use contracts::{ChannelId, ChannelSender, SenderConfig, SenderKind};
use tracing::{info, instrument};

use crate::error::DispatcherError;
use crate::handle::{HandleOptions, SenderHandle};
use crate::metrics::MetricsSnapshot;
use crate::senders::{FileSender, LogSender, SmtpSender, TwilioSender, UdpSender};

/// Builder collecting senders before the registry is frozen
#[derive(Default)]
pub struct RegistryBuilder {
    options: HandleOptions,
    handles: HashMap<ChannelId, SenderHandle>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default queue capacity for senders registered with `register`
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.options.queue_capacity = capacity;
        self
    }

    /// Default in-flight limit for senders registered with `register`
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.options.max_in_flight = max_in_flight;
        self
    }

    /// Register a sender under its own identifier
    ///
    /// # Errors
    /// - `EmptyChannel` when the identifier is blank
    /// - `DuplicateChannel` when another sender already claims the normalized
    ///   identifier; nothing is spawned in that case
    ///
    /// # Panics
    /// Spawns the sender worker, so it must be called from within a Tokio
    /// runtime.
    pub fn register<S>(&mut self, sender: S) -> Result<&mut Self, DispatcherError>
    where
        S: ChannelSender + Sync + 'static,
    {
        let options = self.options;
        self.register_with(sender, options)
    }

    /// Register a sender with explicit queue / concurrency limits
    ///
    /// # Panics
    /// Same as [`register`](Self::register): requires a Tokio runtime.
    pub fn register_with<S>(
        &mut self,
        sender: S,
        options: HandleOptions,
    ) -> Result<&mut Self, DispatcherError>
    where
        S: ChannelSender + Sync + 'static,
    {
        let channel = ChannelId::normalize(sender.identifier());
        if channel.is_empty() {
            return Err(DispatcherError::EmptyChannel {
                name: sender.name().to_string(),
            });
        }
        if let Some(existing) = self.handles.get(&channel) {
            return Err(DispatcherError::DuplicateChannel {
                channel,
                existing: existing.name().to_string(),
                duplicate: sender.name().to_string(),
            });
        }

        let handle = SenderHandle::spawn(sender, options);
        info!(
            sender = %handle.name(),
            channel = %channel,
            queue_capacity = options.queue_capacity,
            max_in_flight = options.max_in_flight,
            "Sender registered"
        );
        self.handles.insert(channel, handle);
        Ok(self)
    }

    /// Freeze the registry
    pub fn build(self) -> SenderRegistry {
        SenderRegistry {
            handles: self.handles,
        }
    }
}

/// Immutable mapping from normalized channel to sender
pub struct SenderRegistry {
    handles: HashMap<ChannelId, SenderHandle>,
}

impl SenderRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Resolve the sender serving `channel` (case-insensitive)
    pub fn resolve(&self, channel: &str) -> Option<&SenderHandle> {
        self.resolve_id(&ChannelId::normalize(channel))
    }

    /// Resolve an already normalized channel
    pub fn resolve_id(&self, channel: &ChannelId) -> Option<&SenderHandle> {
        self.handles.get(channel)
    }

    /// Registered channels, sorted
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = self.handles.keys().cloned().collect();
        channels.sort();
        channels
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Metrics per sender, sorted by channel
    pub fn metrics(&self) -> Vec<(ChannelId, String, MetricsSnapshot)> {
        let mut metrics: Vec<_> = self
            .handles
            .iter()
            .map(|(channel, handle)| {
                (
                    channel.clone(),
                    handle.name().to_string(),
                    handle.metrics().snapshot(),
                )
            })
            .collect();
        metrics.sort_by(|a, b| a.0.cmp(&b.0));
        metrics
    }

    /// Stop every sender worker after its queued deliveries finish
    #[instrument(name = "registry_shutdown", skip(self), fields(senders = self.handles.len()))]
    pub async fn shutdown(self) {
        for (_, handle) in self.handles {
            handle.shutdown().await;
        }
    }
}

/// Build a registry from sender configurations
///
/// Fails on the first sender that cannot be created or that collides with an
/// earlier one.
#[instrument(name = "registry_create", skip(configs), fields(sender_count = configs.len()))]
pub async fn create_registry(configs: &[SenderConfig]) -> Result<SenderRegistry, DispatcherError> {
    let mut builder = RegistryBuilder::new();
    for config in configs {
        let options = HandleOptions {
            queue_capacity: config.queue_capacity,
            max_in_flight: config.max_in_flight,
        };
        let name = config.name.as_str();
        let channel = config.channel.as_str();

        match config.kind {
            SenderKind::Log => {
                builder.register_with(LogSender::new(name, channel), options)?;
            }
            SenderKind::File => {
                let sender = FileSender::from_params(name, channel, &config.params)
                    .map_err(|e| DispatcherError::sender_creation(name, e.to_string()))?;
                builder.register_with(sender, options)?;
            }
            SenderKind::Udp => {
                let sender = UdpSender::from_params(name, channel, &config.params)
                    .await
                    .map_err(|e| DispatcherError::sender_creation(name, e))?;
                builder.register_with(sender, options)?;
            }
            SenderKind::Twilio => {
                let sender = TwilioSender::from_params(name, channel, &config.params)
                    .map_err(|e| DispatcherError::sender_creation(name, e))?;
                builder.register_with(sender, options)?;
            }
            SenderKind::Smtp => {
                let sender = SmtpSender::from_params(name, channel, &config.params)
                    .map_err(|e| DispatcherError::sender_creation(name, e))?;
                builder.register_with(sender, options)?;
            }
        }
    }
    Ok(builder.build())
}
