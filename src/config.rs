use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub producer: ProducerConfig,
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_dlq_topic")]
    pub dlq_topic: String,
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsumerConfig {
    #[serde(default = "default_group_id")]
    pub group_id: String,
    /// Ceiling on requeues before a message is dead-lettered.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProducerConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_produce_interval_ms")]
    pub produce_interval_ms: u64,
    #[serde(default = "default_flush_timeout_secs")]
    pub flush_timeout_secs: u64,
}

impl Config {
    /// Loads configuration from an optional TOML file, overlaid with
    /// `ORDER_PIPELINE__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("ORDER_PIPELINE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("kafka.brokers")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kafka.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(Error::Config("at least one broker is required".to_string()));
        }
        if self.kafka.topic.is_empty() || self.kafka.dlq_topic.is_empty() {
            return Err(Error::Config("topic names must not be empty".to_string()));
        }
        if self.kafka.topic == self.kafka.dlq_topic {
            return Err(Error::Config(format!(
                "dead-letter topic must differ from main topic '{}'",
                self.kafka.topic
            )));
        }
        if self.consumer.group_id.is_empty() {
            return Err(Error::Config("consumer group id must not be empty".to_string()));
        }
        if self.producer.max_attempts == 0 {
            return Err(Error::Config("producer.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn bootstrap_servers(&self) -> String {
        self.kafka.brokers.join(",")
    }
}

impl ConsumerConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl ProducerConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn produce_interval(&self) -> Duration {
        Duration::from_millis(self.produce_interval_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kafka: KafkaConfig::default(),
            consumer: ConsumerConfig::default(),
            producer: ProducerConfig::default(),
            schema_path: default_schema_path(),
        }
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            topic: default_topic(),
            dlq_topic: default_dlq_topic(),
            message_timeout_ms: default_message_timeout_ms(),
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: default_group_id(),
            max_retries: default_max_retries(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            produce_interval_ms: default_produce_interval_ms(),
            flush_timeout_secs: default_flush_timeout_secs(),
        }
    }
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("order.avsc")
}

fn default_brokers() -> Vec<String> {
    vec!["localhost:9092".to_string()]
}

fn default_topic() -> String {
    "orders".to_string()
}

fn default_dlq_topic() -> String {
    "orders-dlq".to_string()
}

fn default_message_timeout_ms() -> u64 {
    5000
}

fn default_group_id() -> String {
    "order-consumers".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_poll_timeout_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_produce_interval_ms() -> u64 {
    1000
}

fn default_flush_timeout_secs() -> u64 {
    5
}
