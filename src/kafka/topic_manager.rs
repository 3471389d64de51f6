use crate::{Error, Result};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Creates the main and dead-letter topics when they are missing.
pub struct TopicManager {
    admin_client: AdminClient<DefaultClientContext>,
    partitions: i32,
    replication_factor: i32,
}

impl TopicManager {
    pub fn new(brokers: &str, partitions: i32, replication_factor: i32) -> Result<Self> {
        let admin_client: AdminClient<_> = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .create()
            .map_err(Error::Kafka)?;

        Ok(Self {
            admin_client,
            partitions,
            replication_factor,
        })
    }

    #[instrument(skip(self))]
    pub async fn ensure_topics(&self, topics: &[&str]) -> Result<()> {
        let existing = self.existing_topics()?;
        let missing: Vec<&str> = topics
            .iter()
            .copied()
            .filter(|t| !existing.iter().any(|e| e == t))
            .collect();

        if missing.is_empty() {
            debug!("All topics already exist");
            return Ok(());
        }

        let new_topics: Vec<NewTopic<'_>> = missing
            .iter()
            .map(|name| {
                NewTopic::new(
                    name,
                    self.partitions,
                    TopicReplication::Fixed(self.replication_factor),
                )
            })
            .collect();

        let opts = AdminOptions::new().operation_timeout(Some(Duration::from_secs(30)));
        let results = self
            .admin_client
            .create_topics(&new_topics, &opts)
            .await
            .map_err(Error::Kafka)?;

        for result in results {
            match result {
                Ok(topic) => info!("Created topic: {}", topic),
                // another client got there first
                Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    debug!("Topic '{}' already exists", topic)
                }
                Err((_topic, code)) => return Err(Error::Kafka(KafkaError::AdminOp(code))),
            }
        }
        Ok(())
    }

    fn existing_topics(&self) -> Result<Vec<String>> {
        let metadata = self
            .admin_client
            .inner()
            .fetch_metadata(None, Duration::from_secs(5))
            .map_err(Error::Kafka)?;

        Ok(metadata
            .topics()
            .iter()
            .map(|topic| topic.name().to_string())
            .collect())
    }
}
