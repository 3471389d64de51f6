//! Error types and result handling for order-pipeline.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! Processing-step failures are deliberately *not* part of this enum: they
//! are domain signals handled by the retry state machine and are modelled by
//! [`ProcessingError`](crate::processor::ProcessingError) instead.
//!
//! # Example
//!
//! ```rust
//! use order_pipeline::{Error, Result};
//!
//! fn load_schema() -> Result<()> {
//!     Err(Error::Schema {
//!         message: "field 'price' has no type".to_string(),
//!     })
//! }
//!
//! match load_schema() {
//!     Ok(()) => println!("Schema loaded"),
//!     Err(Error::Schema { message }) => eprintln!("Bad schema: {}", message),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for order-pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, typically from an invalid value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure while reading or merging configuration sources.
    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// Kafka client, consumer or producer error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// JSON serialization error, e.g. when building a dead-letter payload.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error, typically from reading the schema file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The schema descriptor is malformed or unsupported.
    #[error("Schema error: {message}")]
    Schema {
        /// Description of what was wrong with the schema
        message: String,
    },

    /// A payload could not be decoded against the schema.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decoding failure
        message: String,
    },

    /// A record could not be encoded against the schema.
    #[error("Encode error: {message}")]
    Encode {
        /// Description of the encoding failure
        message: String,
    },

    /// A publish was not acknowledged by the log.
    #[error("Publish to '{topic}' failed: {message}")]
    Publish {
        /// Destination topic
        topic: String,
        /// Transport error description
        message: String,
    },
}

impl Error {
    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Error::Decode {
            message: message.into(),
        }
    }

    pub(crate) fn encode(message: impl Into<String>) -> Self {
        Error::Encode {
            message: message.into(),
        }
    }

    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Error::Schema {
            message: message.into(),
        }
    }
}

/// A convenient Result type alias for order-pipeline operations.
///
/// This is equivalent to `std::result::Result<T, order_pipeline::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
