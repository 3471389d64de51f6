//! Order publishing with exponential backoff.

use crate::codec::RecordCodec;
use crate::headers::Headers;
use crate::message::OutboundMessage;
use crate::order::Order;
use crate::Result;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Hands a record to the transport without waiting for delivery.
pub trait Enqueue: Send + Sync {
    fn enqueue(&self, message: OutboundMessage<'_>) -> Result<()>;

    /// Waits up to `timeout` for outstanding deliveries.
    fn flush(&self, timeout: Duration) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Accepted by the transport on the given attempt.
    Enqueued { attempts: u32 },
    /// Given up on; the record never entered the log.
    Dropped { attempts: u32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    pub enqueued: u64,
    pub dropped: u64,
}

pub struct OrderProducer<E> {
    enqueuer: E,
    codec: RecordCodec,
    topic: String,
    policy: BackoffPolicy,
}

impl<E: Enqueue> OrderProducer<E> {
    pub fn new(enqueuer: E, codec: RecordCodec, topic: impl Into<String>, policy: BackoffPolicy) -> Self {
        Self {
            enqueuer,
            codec,
            topic: topic.into(),
            policy,
        }
    }

    pub fn enqueuer(&self) -> &E {
        &self.enqueuer
    }

    /// Serializes `order` once and enqueues it, sleeping `initial_backoff`,
    /// then twice that, and so on between failed attempts.
    ///
    /// Never returns an error: a record that cannot be enqueued within
    /// `max_attempts` is logged and dropped.
    pub async fn publish(&self, order: &Order) -> PublishOutcome {
        let payload = match self.codec.encode(order) {
            Ok(payload) => payload,
            Err(e) => {
                error!(order_id = %order.order_id, error = %e, "Failed to serialize order; dropping");
                return PublishOutcome::Dropped { attempts: 0 };
            }
        };

        let headers = Headers::new();
        let message = OutboundMessage {
            topic: &self.topic,
            key: Some(order.order_id.as_bytes()),
            payload: &payload,
            headers: &headers,
        };

        let max_attempts = self.policy.max_attempts;
        let mut backoff = self.policy.initial_backoff;

        for attempt in 1..=max_attempts {
            match self.enqueuer.enqueue(message) {
                Ok(()) => return PublishOutcome::Enqueued { attempts: attempt },
                Err(e) => {
                    warn!(
                        order_id = %order.order_id,
                        "Transient error producing (attempt {}/{}): {}",
                        attempt, max_attempts, e
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(backoff).await;
                        backoff = backoff.saturating_mul(2);
                    }
                }
            }
        }

        error!(
            order_id = %order.order_id,
            attempts = max_attempts,
            "Failed to produce after retries. Giving up for this record."
        );
        PublishOutcome::Dropped {
            attempts: max_attempts,
        }
    }

    /// Publishes a random order every `interval` until `shutdown` flips to
    /// `true` or `max_orders` have been attempted, flushing after each one.
    pub async fn run(
        &self,
        interval: Duration,
        flush_timeout: Duration,
        max_orders: Option<u64>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ProducerStats {
        info!(topic = %self.topic, "Starting producer");
        let mut stats = ProducerStats::default();

        loop {
            if *shutdown.borrow() {
                break;
            }
            if max_orders.is_some_and(|max| stats.enqueued + stats.dropped >= max) {
                break;
            }

            let order = Order::random(&mut rand::thread_rng());
            info!(
                order_id = %order.order_id,
                product = %order.product,
                price = order.price,
                "Sending order"
            );

            match self.publish(&order).await {
                PublishOutcome::Enqueued { .. } => stats.enqueued += 1,
                PublishOutcome::Dropped { .. } => stats.dropped += 1,
            }

            if let Err(e) = self.enqueuer.flush(flush_timeout) {
                warn!(error = %e, "Flush did not complete");
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }

        if let Err(e) = self.enqueuer.flush(flush_timeout) {
            warn!(error = %e, "Final flush did not complete");
        }
        info!(enqueued = stats.enqueued, dropped = stats.dropped, "Producer stopped");
        stats
    }
}
