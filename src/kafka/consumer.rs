use crate::consumer::{MessageSource, OffsetTracker};
use crate::message::{InboundMessage, Position};
use crate::{Error, Result};
use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::{ClientConfig, Offset};
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::headers::from_kafka;

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// A subscribed consumer with manual offset commits.
pub struct KafkaSource {
    consumer: StreamConsumer,
}

impl KafkaSource {
    /// Creates the consumer and subscribes to `topic`. With no committed
    /// position for the group, reading starts at the earliest offset.
    #[instrument(skip(brokers))]
    pub fn subscribe(brokers: &str, group_id: &str, topic: &str) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "true")
            .create()
            .map_err(Error::Kafka)?;

        consumer.subscribe(&[topic]).map_err(Error::Kafka)?;
        info!("Subscribed");

        Ok(Self { consumer })
    }

    /// Leaves the consumer group. The connection itself closes on drop.
    pub fn close(&self) {
        self.consumer.unsubscribe();
        info!("Consumer unsubscribed");
    }
}

fn to_inbound(message: &BorrowedMessage<'_>) -> InboundMessage {
    InboundMessage {
        position: Position {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
        },
        key: message.key().map(<[u8]>::to_vec),
        payload: message.payload().map(<[u8]>::to_vec),
        headers: from_kafka(message.headers()),
    }
}

impl OffsetTracker for KafkaSource {
    /// Blocks until the broker acknowledges the commit.
    fn commit(&self, position: &Position) -> Result<()> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &position.topic,
                position.partition,
                Offset::Offset(position.offset + 1),
            )
            .map_err(Error::Kafka)?;
        self.consumer
            .commit(&offsets, CommitMode::Sync)
            .map_err(Error::Kafka)
    }

    /// Blocks for at most `SEEK_TIMEOUT`.
    fn rewind(&self, position: &Position) -> Result<()> {
        self.consumer
            .seek(
                &position.topic,
                position.partition,
                Offset::Offset(position.offset),
                SEEK_TIMEOUT,
            )
            .map_err(Error::Kafka)
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn poll(&self, timeout: Duration) -> Result<Option<InboundMessage>> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_elapsed) => Ok(None),
            Ok(Ok(message)) => Ok(Some(to_inbound(&message))),
            Ok(Err(KafkaError::PartitionEOF(partition))) => {
                debug!(partition, "Reached end of partition");
                Ok(None)
            }
            Ok(Err(e)) => Err(Error::Kafka(e)),
        }
    }
}
