//! Schema-driven record encoding shared by the producer and the consumer.
//!
//! Payloads are schemaless Avro binary: the datum alone, with no container
//! header or embedded schema. Decoding is strict: a payload must hold exactly
//! one datum of the schema and nothing after it, so a payload written under a
//! different schema is reported as an [`Error::Decode`] rather than misread.

pub mod schema;

pub use schema::Schema;

use crate::{Error, Result};
use apache_avro::types::Value;
use apache_avro::{from_avro_datum, to_avro_datum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RecordCodec {
    schema: Arc<Schema>,
}

impl RecordCodec {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn encode<T: Serialize>(&self, record: &T) -> Result<Vec<u8>> {
        let value = apache_avro::to_value(record).map_err(|e| Error::encode(e.to_string()))?;
        self.encode_value(value)
    }

    pub fn decode<T: DeserializeOwned>(&self, payload: &[u8]) -> Result<T> {
        let value = self.decode_value(payload)?;
        apache_avro::from_value(&value).map_err(|e| Error::decode(e.to_string()))
    }

    pub fn encode_value(&self, value: Value) -> Result<Vec<u8>> {
        let schema = self.schema.as_avro();
        let resolved = value
            .resolve(schema)
            .map_err(|e| Error::encode(format!("'{}': {}", self.schema.name(), e)))?;
        to_avro_datum(schema, resolved).map_err(|e| Error::encode(e.to_string()))
    }

    pub fn decode_value(&self, payload: &[u8]) -> Result<Value> {
        let mut reader = payload;
        let value = from_avro_datum(self.schema.as_avro(), &mut reader, None)
            .map_err(|e| Error::decode(e.to_string()))?;

        if !reader.is_empty() {
            return Err(Error::decode(format!(
                "{} trailing bytes after '{}' record",
                reader.len(),
                self.schema.name()
            )));
        }
        Ok(value)
    }
}
