//! rdkafka-backed implementations of the pipeline's log seams.

pub mod consumer;
pub mod headers;
pub mod producer;
pub mod topic_manager;


pub use consumer::KafkaSource;
pub use producer::{KafkaEnqueuer, KafkaPublisher};
pub use topic_manager::TopicManager;
