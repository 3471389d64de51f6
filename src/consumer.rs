//! Poll, dispatch, commit.
//!
//! One message is in flight at a time. A message's position is committed
//! only after its outcome (processed, requeued, dead-lettered) is durable;
//! if a requeue or dead-letter publish is not acknowledged, the position is
//! rewound instead so the log hands the message back on a later poll.
//! A crash between acknowledgement and commit can therefore duplicate a
//! message, never lose one.

use crate::dispatcher::{Dispatcher, Outcome, Publisher};
use crate::message::{InboundMessage, Position};
use crate::processor::{OrderProcessor, RunningAverage};
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Durable progress markers for a consumer.
///
/// Both calls are synchronous and may block the calling task until the
/// broker answers (a sync commit, or a seek bounded by its own timeout).
pub trait OffsetTracker: Send + Sync {
    /// Marks `position` as fully handled.
    fn commit(&self, position: &Position) -> Result<()>;

    /// Moves the read position back so `position` is delivered again.
    fn rewind(&self, position: &Position) -> Result<()>;
}

/// The subscribed side of the log.
#[async_trait]
pub trait MessageSource: OffsetTracker {
    /// Waits up to `timeout` for the next message. `Ok(None)` means nothing
    /// arrived, which is not an error.
    async fn poll(&self, timeout: Duration) -> Result<Option<InboundMessage>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub processed: u64,
    pub requeued: u64,
    pub dead_lettered: u64,
    /// Messages whose outcome could not be recorded and were left uncommitted.
    pub uncommitted: u64,
}

impl ConsumerStats {
    pub fn handled(&self) -> u64 {
        self.processed + self.requeued + self.dead_lettered + self.uncommitted
    }

    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Processed { .. } => self.processed += 1,
            Outcome::Requeued { .. } => self.requeued += 1,
            Outcome::DeadLettered(_) => self.dead_lettered += 1,
        }
    }
}

/// Runs the dispatch for one message and then commits, or rewinds if the
/// outcome could not be recorded.
pub async fn handle_message<P, B, T>(
    dispatcher: &Dispatcher<P>,
    publisher: &B,
    tracker: &T,
    message: &InboundMessage,
    average: &mut RunningAverage,
) -> Result<Outcome>
where
    P: OrderProcessor,
    B: Publisher + ?Sized,
    T: OffsetTracker + ?Sized,
{
    match dispatcher.dispatch(message, publisher, average).await {
        Ok(outcome) => {
            tracker.commit(&message.position)?;
            debug!(position = %message.position, "Committed");
            Ok(outcome)
        }
        Err(e) => {
            if let Err(rewind_err) = tracker.rewind(&message.position) {
                error!(
                    position = %message.position,
                    error = %rewind_err,
                    "Failed to rewind after unrecorded outcome"
                );
            }
            Err(e)
        }
    }
}

pub struct OrderConsumer<P, S, B> {
    dispatcher: Dispatcher<P>,
    source: S,
    publisher: B,
    poll_timeout: Duration,
    max_messages: Option<u64>,
    average: RunningAverage,
    stats: ConsumerStats,
}

impl<P, S, B> OrderConsumer<P, S, B>
where
    P: OrderProcessor,
    S: MessageSource,
    B: Publisher,
{
    pub fn new(dispatcher: Dispatcher<P>, source: S, publisher: B, poll_timeout: Duration) -> Self {
        Self {
            dispatcher,
            source,
            publisher,
            poll_timeout,
            max_messages: None,
            average: RunningAverage::new(),
            stats: ConsumerStats::default(),
        }
    }

    /// Stops after this many messages have been handled.
    pub fn with_max_messages(mut self, max_messages: Option<u64>) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn average(&self) -> &RunningAverage {
        &self.average
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn publisher(&self) -> &B {
        &self.publisher
    }

    /// Consumes until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Shutdown is only observed between messages; a message already being
    /// handled always runs to its commit or rewind.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<ConsumerStats> {
        info!(
            topic = %self.dispatcher.config().topic,
            dlq_topic = %self.dispatcher.config().dlq_topic,
            max_retries = self.dispatcher.config().max_retries,
            "Consumer started. Listening for messages..."
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Some(max) = self.max_messages {
                if self.stats.handled() >= max {
                    info!(max, "Reached message limit");
                    break;
                }
            }

            let polled = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                polled = self.source.poll(self.poll_timeout) => polled,
            };

            let message = match polled {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    error!(error = %e, "Consumer error");
                    continue;
                }
            };

            match handle_message(
                &self.dispatcher,
                &self.publisher,
                &self.source,
                &message,
                &mut self.average,
            )
            .await
            {
                Ok(outcome) => self.stats.record(&outcome),
                Err(e) => {
                    self.stats.uncommitted += 1;
                    warn!(
                        position = %message.position,
                        error = %e,
                        "Outcome not recorded; message left uncommitted for redelivery"
                    );
                }
            }
        }

        info!(
            processed = self.stats.processed,
            requeued = self.stats.requeued,
            dead_lettered = self.stats.dead_lettered,
            uncommitted = self.stats.uncommitted,
            average_price = self.average.average(),
            "Consumer stopped"
        );
        Ok(self.stats)
    }
}
