#![allow(dead_code)]

use async_trait::async_trait;
use order_pipeline::codec::{RecordCodec, Schema};
use order_pipeline::consumer::{MessageSource, OffsetTracker};
use order_pipeline::dispatcher::{Dispatcher, DispatcherConfig, Publisher};
use order_pipeline::headers::Headers;
use order_pipeline::message::{InboundMessage, OutboundMessage, Position};
use order_pipeline::processor::PriceThresholdProcessor;
use order_pipeline::producer::Enqueue;
use order_pipeline::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TOPIC: &str = "orders";
pub const DLQ_TOPIC: &str = "orders-dlq";

/// Path of the schema shipped with the crate.
pub fn schema_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("order.avsc")
}

pub fn order_codec() -> RecordCodec {
    RecordCodec::new(Schema::from_file(schema_path()).unwrap())
}

pub fn dispatcher() -> Dispatcher<PriceThresholdProcessor> {
    Dispatcher::new(
        order_codec(),
        PriceThresholdProcessor::default(),
        DispatcherConfig {
            topic: TOPIC.to_string(),
            dlq_topic: DLQ_TOPIC.to_string(),
            max_retries: 3,
        },
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
    pub headers: Headers,
}

#[derive(Default)]
struct State {
    topics: HashMap<String, Vec<StoredMessage>>,
    cursor: usize,
    commits: Vec<Position>,
    rewinds: Vec<Position>,
    publish_failures: u32,
    enqueue_failures: u32,
}

/// A single-partition, in-process stand-in for the broker. Consumers read
/// the main topic; any topic can be written.
#[derive(Clone, Default)]
pub struct InMemoryLog {
    state: Arc<Mutex<State>>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, topic: &str, payload: Option<Vec<u8>>, headers: Headers) {
        self.state
            .lock()
            .unwrap()
            .topics
            .entry(topic.to_string())
            .or_default()
            .push(StoredMessage {
                key: None,
                payload,
                headers,
            });
    }

    pub fn messages(&self, topic: &str) -> Vec<StoredMessage> {
        self.state
            .lock()
            .unwrap()
            .topics
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    pub fn commits(&self) -> Vec<Position> {
        self.state.lock().unwrap().commits.clone()
    }

    pub fn committed_offsets(&self) -> Vec<i64> {
        self.commits().iter().map(|p| p.offset).collect()
    }

    pub fn rewinds(&self) -> Vec<Position> {
        self.state.lock().unwrap().rewinds.clone()
    }

    /// The next `n` publishes are rejected.
    pub fn fail_next_publishes(&self, n: u32) {
        self.state.lock().unwrap().publish_failures = n;
    }

    /// The next `n` enqueues are rejected.
    pub fn fail_next_enqueues(&self, n: u32) {
        self.state.lock().unwrap().enqueue_failures = n;
    }

    fn write(&self, message: OutboundMessage<'_>, fail_enqueue: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let failures = if fail_enqueue {
            &mut state.enqueue_failures
        } else {
            &mut state.publish_failures
        };
        if *failures > 0 {
            *failures -= 1;
            return Err(Error::Publish {
                topic: message.topic.to_string(),
                message: "injected failure".to_string(),
            });
        }

        state
            .topics
            .entry(message.topic.to_string())
            .or_default()
            .push(StoredMessage {
                key: message.key.map(<[u8]>::to_vec),
                payload: Some(message.payload.to_vec()),
                headers: message.headers.clone(),
            });
        Ok(())
    }
}

impl OffsetTracker for InMemoryLog {
    fn commit(&self, position: &Position) -> Result<()> {
        self.state.lock().unwrap().commits.push(position.clone());
        Ok(())
    }

    fn rewind(&self, position: &Position) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.cursor = position.offset as usize;
        state.rewinds.push(position.clone());
        Ok(())
    }
}

#[async_trait]
impl MessageSource for InMemoryLog {
    async fn poll(&self, timeout: Duration) -> Result<Option<InboundMessage>> {
        let next = {
            let mut state = self.state.lock().unwrap();
            let cursor = state.cursor;
            let stored = state
                .topics
                .get(TOPIC)
                .and_then(|messages| messages.get(cursor))
                .cloned();
            if stored.is_some() {
                state.cursor += 1;
            }
            stored.map(|stored| InboundMessage {
                position: Position {
                    topic: TOPIC.to_string(),
                    partition: 0,
                    offset: cursor as i64,
                },
                key: stored.key,
                payload: stored.payload,
                headers: stored.headers,
            })
        };

        if next.is_none() {
            tokio::time::sleep(timeout).await;
        }
        Ok(next)
    }
}

#[async_trait]
impl Publisher for InMemoryLog {
    async fn publish(&self, message: OutboundMessage<'_>) -> Result<()> {
        self.write(message, false)
    }
}

impl Enqueue for InMemoryLog {
    fn enqueue(&self, message: OutboundMessage<'_>) -> Result<()> {
        self.write(message, true)
    }

    fn flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}
