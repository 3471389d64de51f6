//! Retry and dead-letter routing for consumed orders.
//!
//! Every consumed message ends in exactly one [`Outcome`]:
//!
//! - undecodable payload: dead-lettered as a hex wrapper, retry header ignored
//! - processed: the running average is updated
//! - failed with `retry < max_retries`: the original payload bytes are
//!   republished to the main topic with `retry + 1`
//! - failed with `retry >= max_retries`: the decoded order is dead-lettered
//!
//! Any publish must be acknowledged before [`Dispatcher::dispatch`] returns
//! `Ok`; the caller commits only after that.

use crate::codec::RecordCodec;
use crate::dead_letter::DeadLetter;
use crate::headers::{extract_retry_count, set_retry_count};
use crate::message::{InboundMessage, OutboundMessage};
use crate::order::Order;
use crate::processor::{OrderProcessor, RunningAverage};
use crate::Result;
use async_trait::async_trait;
use tracing::{error, info, warn};

/// Writes messages to the log.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Resolves once the log has acknowledged the write.
    async fn publish(&self, message: OutboundMessage<'_>) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Processed { order_id: String, average: f64 },
    Requeued { order_id: String, retry: u32 },
    DeadLettered(DeadLetter),
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub topic: String,
    pub dlq_topic: String,
    pub max_retries: u32,
}

pub struct Dispatcher<P> {
    codec: RecordCodec,
    processor: P,
    config: DispatcherConfig,
}

impl<P: OrderProcessor> Dispatcher<P> {
    pub fn new(codec: RecordCodec, processor: P, config: DispatcherConfig) -> Self {
        Self {
            codec,
            processor,
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub async fn dispatch<B>(
        &self,
        message: &InboundMessage,
        publisher: &B,
        average: &mut RunningAverage,
    ) -> Result<Outcome>
    where
        B: Publisher + ?Sized,
    {
        let raw = message.payload.as_deref().unwrap_or_default();

        let order: Order = match message.payload.as_deref().map(|p| self.codec.decode(p)) {
            Some(Ok(order)) => order,
            Some(Err(e)) => {
                warn!(position = %message.position, error = %e, "Failed to deserialize message; sending to DLQ");
                return self.dead_letter(message, DeadLetter::undecodable(raw), publisher).await;
            }
            None => {
                warn!(position = %message.position, "Message has no payload; sending to DLQ");
                return self.dead_letter(message, DeadLetter::undecodable(raw), publisher).await;
            }
        };

        let retry = extract_retry_count(&message.headers);
        info!(
            order_id = %order.order_id,
            product = %order.product,
            price = order.price,
            retry,
            "Received order"
        );

        match self.processor.process(&order) {
            Ok(()) => {
                let avg = average.record(order.price);
                info!(
                    order_id = %order.order_id,
                    "Processed order. Running average price = {:.2}",
                    avg
                );
                Ok(Outcome::Processed {
                    order_id: order.order_id,
                    average: avg,
                })
            }
            Err(e) if retry < self.config.max_retries => {
                warn!(order_id = %order.order_id, retry, error = %e, "Processing error");
                let next = retry + 1;
                self.requeue(message, raw, next, publisher).await?;
                Ok(Outcome::Requeued {
                    order_id: order.order_id,
                    retry: next,
                })
            }
            Err(e) => {
                warn!(
                    order_id = %order.order_id,
                    retry,
                    max_retries = self.config.max_retries,
                    error = %e,
                    "Max retries exceeded; sending to DLQ"
                );
                self.dead_letter(message, DeadLetter::Exhausted(order), publisher)
                    .await
            }
        }
    }

    async fn requeue<B>(
        &self,
        message: &InboundMessage,
        raw: &[u8],
        next_retry: u32,
        publisher: &B,
    ) -> Result<()>
    where
        B: Publisher + ?Sized,
    {
        let headers = set_retry_count(&message.headers, next_retry);
        publisher
            .publish(OutboundMessage {
                topic: &self.config.topic,
                key: message.key.as_deref(),
                payload: raw,
                headers: &headers,
            })
            .await
            .map_err(|e| {
                error!(position = %message.position, error = %e, "Requeue was not acknowledged");
                e
            })?;

        info!(topic = %self.config.topic, retry = next_retry, "Requeued message");
        Ok(())
    }

    async fn dead_letter<B>(
        &self,
        message: &InboundMessage,
        letter: DeadLetter,
        publisher: &B,
    ) -> Result<Outcome>
    where
        B: Publisher + ?Sized,
    {
        let payload = letter.to_payload()?;
        publisher
            .publish(OutboundMessage {
                topic: &self.config.dlq_topic,
                key: message.key.as_deref(),
                payload: &payload,
                headers: &message.headers,
            })
            .await
            .map_err(|e| {
                error!(position = %message.position, error = %e, "Dead-letter publish was not acknowledged");
                e
            })?;

        info!(
            topic = %self.config.dlq_topic,
            reason = letter.reason(),
            "Sent to DLQ"
        );
        Ok(Outcome::DeadLettered(letter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Schema;
    use crate::headers::Headers;
    use crate::message::Position;
    use crate::processor::PriceThresholdProcessor;
    use crate::Error;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<(String, Vec<u8>, Headers)>>,
        fail: bool,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, message: OutboundMessage<'_>) -> Result<()> {
            if self.fail {
                return Err(Error::Publish {
                    topic: message.topic.to_string(),
                    message: "broker unavailable".to_string(),
                });
            }
            self.sent.lock().unwrap().push((
                message.topic.to_string(),
                message.payload.to_vec(),
                message.headers.clone(),
            ));
            Ok(())
        }
    }

    fn dispatcher() -> Dispatcher<PriceThresholdProcessor> {
        let schema = Schema::parse_str(
            r#"{"type": "record", "name": "Order", "fields": [
                {"name": "orderId", "type": "string"},
                {"name": "product", "type": "string"},
                {"name": "price", "type": "double"}
            ]}"#,
        )
        .unwrap();
        Dispatcher::new(
            RecordCodec::new(schema),
            PriceThresholdProcessor::default(),
            DispatcherConfig {
                topic: "orders".to_string(),
                dlq_topic: "orders-dlq".to_string(),
                max_retries: 3,
            },
        )
    }

    fn message(dispatcher: &Dispatcher<PriceThresholdProcessor>, order: &Order) -> InboundMessage {
        let payload = dispatcher.codec.encode(order).unwrap();
        InboundMessage::new(
            Position {
                topic: "orders".to_string(),
                partition: 0,
                offset: 7,
            },
            payload,
        )
    }

    #[tokio::test]
    async fn test_success_updates_average_without_publishing() {
        let dispatcher = dispatcher();
        let publisher = RecordingPublisher::default();
        let mut average = RunningAverage::new();

        let msg = message(&dispatcher, &Order::new("x1", "Item1", 10.0));
        let outcome = dispatcher.dispatch(&msg, &publisher, &mut average).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Processed {
                order_id: "x1".to_string(),
                average: 10.0
            }
        );
        assert_eq!(average.count(), 1);
        assert!(publisher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_requeues_original_bytes() {
        let dispatcher = dispatcher();
        let publisher = RecordingPublisher::default();
        let mut average = RunningAverage::new();

        let msg = message(&dispatcher, &Order::new("x2", "Item2", 100.0))
            .with_headers(Headers::new().with("trace-id", "t"));
        let outcome = dispatcher.dispatch(&msg, &publisher, &mut average).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Requeued {
                order_id: "x2".to_string(),
                retry: 1
            }
        );
        let sent = publisher.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "orders");
        assert_eq!(Some(&sent[0].1), msg.payload.as_ref());
        assert_eq!(sent[0].2.keys(), vec!["trace-id", "retry"]);
        assert_eq!(extract_retry_count(&sent[0].2), 1);
        assert_eq!(average.count(), 0);
    }

    #[tokio::test]
    async fn test_infinite_price_is_requeued_not_dead_lettered() {
        let dispatcher = dispatcher();
        let publisher = RecordingPublisher::default();
        let mut average = RunningAverage::new();

        let msg = message(&dispatcher, &Order::new("x1", "Item1", f64::INFINITY));
        let outcome = dispatcher.dispatch(&msg, &publisher, &mut average).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Requeued {
                order_id: "x1".to_string(),
                retry: 1
            }
        );
        let sent = publisher.sent.lock().unwrap();
        assert_eq!(sent[0].0, "orders");
        assert_eq!(Some(&sent[0].1), msg.payload.as_ref());
    }

    #[tokio::test]
    async fn test_exhausted_retries_dead_letter_decoded_order() {
        let dispatcher = dispatcher();
        let publisher = RecordingPublisher::default();
        let mut average = RunningAverage::new();

        let headers = Headers::new().with("retry", "3");
        let msg = message(&dispatcher, &Order::new("x2", "Item2", 100.0)).with_headers(headers.clone());
        let outcome = dispatcher.dispatch(&msg, &publisher, &mut average).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::DeadLettered(DeadLetter::Exhausted(Order::new("x2", "Item2", 100.0)))
        );
        let sent = publisher.sent.lock().unwrap();
        assert_eq!(sent[0].0, "orders-dlq");
        assert_eq!(sent[0].2, headers);
        let order: Order = serde_json::from_slice(&sent[0].1).unwrap();
        assert_eq!(order.order_id, "x2");
    }

    #[tokio::test]
    async fn test_undecodable_ignores_retry_header() {
        let dispatcher = dispatcher();
        let publisher = RecordingPublisher::default();
        let mut average = RunningAverage::new();

        let msg = InboundMessage::new(
            Position {
                topic: "orders".to_string(),
                partition: 0,
                offset: 1,
            },
            vec![0xff, 0x00],
        )
        .with_headers(Headers::new().with("retry", "1"));

        let outcome = dispatcher.dispatch(&msg, &publisher, &mut average).await.unwrap();
        assert_eq!(outcome, Outcome::DeadLettered(DeadLetter::undecodable(&[0xff, 0x00])));

        let sent = publisher.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "orders-dlq");
        assert_eq!(sent[0].1, br#"{"raw_bytes_hex":"ff00"}"#.to_vec());
        assert_eq!(extract_retry_count(&sent[0].2), 1);
    }

    #[tokio::test]
    async fn test_missing_payload_is_dead_lettered() {
        let dispatcher = dispatcher();
        let publisher = RecordingPublisher::default();
        let mut msg = message(&dispatcher, &Order::new("x1", "Item1", 1.0));
        msg.payload = None;

        let outcome = dispatcher
            .dispatch(&msg, &publisher, &mut RunningAverage::new())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::DeadLettered(DeadLetter::undecodable(&[])));
    }

    #[tokio::test]
    async fn test_publish_failure_is_returned() {
        let dispatcher = dispatcher();
        let publisher = RecordingPublisher {
            fail: true,
            ..Default::default()
        };

        let msg = message(&dispatcher, &Order::new("x2", "Item2", 100.0));
        let result = dispatcher
            .dispatch(&msg, &publisher, &mut RunningAverage::new())
            .await;
        assert!(matches!(result, Err(Error::Publish { .. })));
    }
}
