use crate::{Error, Result};
use apache_avro::Schema as AvroSchema;
use std::path::Path;
use tracing::{debug, info};

/// The shared record schema, parsed from an Avro JSON descriptor (`.avsc`).
///
/// The top level must be a record; field types are anything Avro allows.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    avro: AvroSchema,
}

impl Schema {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading schema from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let schema = Self::parse_str(&content)?;
        info!(
            schema = %schema.name(),
            fields = schema.field_names().len(),
            "Loaded record schema"
        );
        Ok(schema)
    }

    pub fn parse_str(content: &str) -> Result<Self> {
        let avro = AvroSchema::parse_str(content).map_err(|e| Error::schema(e.to_string()))?;
        match avro {
            AvroSchema::Record(_) => Ok(Self { avro }),
            other => Err(Error::schema(format!(
                "top-level type must be 'record', got {:?}",
                other
            ))),
        }
    }

    /// Record name without its namespace.
    pub fn name(&self) -> &str {
        match &self.avro {
            AvroSchema::Record(record) => &record.name.name,
            _ => "",
        }
    }

    /// Field names in wire order.
    pub fn field_names(&self) -> Vec<&str> {
        match &self.avro {
            AvroSchema::Record(record) => record.fields.iter().map(|f| f.name.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn as_avro(&self) -> &AvroSchema {
        &self.avro
    }
}
