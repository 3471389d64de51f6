use crate::dispatcher::Publisher;
use crate::message::OutboundMessage;
use crate::producer::Enqueue;
use crate::{config::KafkaConfig, Error, Result};
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::headers::to_kafka;

fn create_producer(brokers: &str, config: &KafkaConfig) -> Result<FutureProducer> {
    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("message.timeout.ms", config.message_timeout_ms.to_string())
        .set("acks", "all")
        .create()
        .map_err(Error::Kafka)?;
    Ok(producer)
}

fn record<'a>(message: &OutboundMessage<'a>) -> FutureRecord<'a, [u8], [u8]> {
    let record = FutureRecord::to(message.topic)
        .payload(message.payload)
        .headers(to_kafka(message.headers));
    match message.key {
        Some(key) => record.key(key),
        None => record,
    }
}

/// Publishes and waits for the broker's delivery acknowledgement.
///
/// Used by the consumer for requeues and dead letters, where the
/// acknowledgement gates the offset commit.
#[derive(Clone)]
pub struct KafkaPublisher {
    producer: FutureProducer,
    send_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(brokers: &str, config: &KafkaConfig) -> Result<Self> {
        Ok(Self {
            producer: create_producer(brokers, config)?,
            send_timeout: Duration::from_millis(config.message_timeout_ms),
        })
    }

    pub fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer.flush(timeout).map_err(Error::Kafka)
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn publish(&self, message: OutboundMessage<'_>) -> Result<()> {
        match self
            .producer
            .send(record(&message), Timeout::After(self.send_timeout))
            .await
        {
            Ok((partition, offset)) => {
                debug!(
                    topic = message.topic,
                    partition, offset, "Publish acknowledged"
                );
                Ok(())
            }
            Err((e, _)) => Err(Error::Publish {
                topic: message.topic.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Hands records to the client queue without waiting for delivery.
///
/// Each delivery report is logged from a spawned task, so the caller only
/// blocks on the enqueue itself. Must be used inside a Tokio runtime.
#[derive(Clone)]
pub struct KafkaEnqueuer {
    producer: FutureProducer,
}

impl KafkaEnqueuer {
    pub fn new(brokers: &str, config: &KafkaConfig) -> Result<Self> {
        Ok(Self {
            producer: create_producer(brokers, config)?,
        })
    }
}

impl Enqueue for KafkaEnqueuer {
    fn enqueue(&self, message: OutboundMessage<'_>) -> Result<()> {
        let delivery = self
            .producer
            .send_result(record(&message))
            .map_err(|(e, _)| Error::Publish {
                topic: message.topic.to_string(),
                message: e.to_string(),
            })?;

        tokio::spawn(async move {
            match delivery.await {
                Ok(Ok((partition, offset))) => {
                    info!(partition, offset, "Delivered message");
                }
                Ok(Err((e, _))) => error!(error = %e, "Delivery failed"),
                Err(_) => warn!("Delivery report dropped before completion"),
            }
        });
        Ok(())
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer.flush(timeout).map_err(Error::Kafka)
    }
}
