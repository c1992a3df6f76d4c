//! SenderHandle - runs a sender behind an isolated queue and worker task

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, instrument, warn};

use contracts::{ChannelId, ChannelSender, DeliveryError, NotificationMessage};

use crate::metrics::SenderMetrics;

/// Per-sender queue and concurrency limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleOptions {
    /// Messages waiting for a delivery slot
    pub queue_capacity: usize,
    /// Deliveries running at the same time
    pub max_in_flight: usize,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            max_in_flight: 8,
        }
    }
}

struct DeliveryJob {
    message: NotificationMessage,
    timeout: Duration,
    deadline: Instant,
    /// Set by whichever side acts first: the worker starting the delivery
    /// or the caller giving up at the deadline.
    claimed: Arc<AtomicBool>,
    reply: oneshot::Sender<Result<(), DeliveryError>>,
}

impl DeliveryJob {
    /// Claim the job for delivery; false once the caller has abandoned it
    fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }
}

/// Handle to a running sender worker
///
/// A slow or failing sender only ever fills its own queue; other channels
/// keep flowing.
pub struct SenderHandle {
    name: String,
    channel: ChannelId,
    tx: mpsc::Sender<DeliveryJob>,
    metrics: Arc<SenderMetrics>,
    worker_handle: JoinHandle<()>,
}

impl SenderHandle {
    /// Create a new SenderHandle and spawn the worker task
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn spawn<S>(sender: S, options: HandleOptions) -> Self
    where
        S: ChannelSender + Sync + 'static,
    {
        let name = sender.name().to_string();
        let channel = ChannelId::normalize(sender.identifier());
        let (tx, rx) = mpsc::channel(options.queue_capacity.max(1));
        let metrics = Arc::new(SenderMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();
        let max_in_flight = options.max_in_flight.max(1);

        let worker_handle = tokio::spawn(async move {
            sender_worker(
                Arc::new(sender),
                rx,
                worker_metrics,
                worker_name,
                max_in_flight,
            )
            .await;
        });

        Self {
            name,
            channel,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sender name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized channel this sender serves
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SenderMetrics> {
        &self.metrics
    }

    /// Deliver one message and wait for the outcome
    ///
    /// Never blocks on a full queue: the message is refused with
    /// `DeliveryError::QueueFull` instead. The timeout covers queueing and
    /// the sender call. A message reported as timed out is never delivered
    /// afterwards: once the deadline passes, a job still waiting for a
    /// delivery slot is abandoned, and a job already started is awaited
    /// until the sender call itself hits the deadline.
    pub async fn deliver(
        &self,
        message: &NotificationMessage,
        timeout: Duration,
    ) -> Result<(), DeliveryError> {
        let (reply, mut rx) = oneshot::channel();
        let claimed = Arc::new(AtomicBool::new(false));
        let deadline = Instant::now() + timeout;
        let job = DeliveryJob {
            message: message.clone(),
            timeout,
            deadline,
            claimed: Arc::clone(&claimed),
            reply,
        };

        match self.tx.try_send(job) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    sender = %self.name,
                    channel = %self.channel,
                    "Queue full, message refused"
                );
                return Err(DeliveryError::QueueFull {
                    sender: self.name.clone(),
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sender = %self.name, "Sender worker closed unexpectedly");
                return Err(DeliveryError::unavailable(&self.name, "worker stopped"));
            }
        }

        let reply = match tokio::time::timeout_at(deadline, &mut rx).await {
            Ok(reply) => Some(reply),
            Err(_) if !claimed.swap(true, Ordering::AcqRel) => {
                debug!(sender = %self.name, "Deadline passed while queued, job abandoned");
                None
            }
            // Delivery already started; its own deadline bounds the wait.
            Err(_) => Some(rx.await),
        };

        let result = match reply {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(DeliveryError::unavailable(
                &self.name,
                "delivery task aborted",
            )),
            None => Err(timeout_error(timeout)),
        };

        match &result {
            Ok(()) => self.metrics.inc_delivered_count(),
            Err(e) => {
                self.metrics.inc_failure_count();
                if e.is_timeout() {
                    self.metrics.inc_timeout_count();
                }
            }
        }

        result
    }

    /// Shutdown the sender worker gracefully
    ///
    /// Queued messages are still delivered before the worker exits.
    #[instrument(name = "sender_handle_shutdown", skip(self), fields(sender = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sender = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sender = %self.name, "SenderHandle shutdown complete");
    }
}

fn timeout_error(timeout: Duration) -> DeliveryError {
    DeliveryError::Timeout {
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}

/// Worker task that pulls jobs and runs up to `max_in_flight` deliveries
#[instrument(
    name = "sender_worker_loop",
    skip(sender, rx, metrics),
    fields(sender = %name)
)]
async fn sender_worker<S>(
    sender: Arc<S>,
    mut rx: mpsc::Receiver<DeliveryJob>,
    metrics: Arc<SenderMetrics>,
    name: String,
    max_in_flight: usize,
) where
    S: ChannelSender + Sync + 'static,
{
    debug!(sender = %name, max_in_flight, "Sender worker started");

    let permits = Arc::new(Semaphore::new(max_in_flight));
    let mut tasks = JoinSet::new();

    while let Some(job) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        reap_finished(&mut tasks, &name);

        if !job.claim() {
            debug!(sender = %name, "Skipping job abandoned by its caller");
            continue;
        }

        let sender = Arc::clone(&sender);
        tasks.spawn(async move {
            let _permit = permit;
            let DeliveryJob {
                message,
                timeout,
                deadline,
                reply,
                ..
            } = job;

            let result = if Instant::now() >= deadline {
                Err(timeout_error(timeout))
            } else {
                match tokio::time::timeout_at(deadline, sender.deliver(&message)).await {
                    Ok(result) => result,
                    Err(_) => Err(timeout_error(timeout)),
                }
            };
            let _ = reply.send(result);
        });

        metrics.set_in_flight(max_in_flight - permits.available_permits());
    }

    while let Some(joined) = tasks.join_next().await {
        log_join_error(joined, &name);
    }
    metrics.set_in_flight(0);
    metrics.set_queue_len(0);

    debug!(sender = %name, "Sender worker stopped");
}

fn reap_finished(tasks: &mut JoinSet<()>, name: &str) {
    while let Some(joined) = tasks.try_join_next() {
        log_join_error(joined, name);
    }
}

fn log_join_error(joined: Result<(), tokio::task::JoinError>, name: &str) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(sender = %name, "Delivery task panicked");
        } else {
            warn!(sender = %name, error = %e, "Delivery task cancelled");
        }
    }
}
