//! Dead-letter payloads.
//!
//! Two shapes reach the dead-letter topic: undecodable bytes wrapped as
//! `{"raw_bytes_hex": "..."}`, and orders that exhausted their retries,
//! written as the decoded record in JSON.

use crate::order::Order;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Wrapper for a payload that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBytesWrapper {
    pub raw_bytes_hex: String,
}

impl RawBytesWrapper {
    pub fn new(raw: &[u8]) -> Self {
        Self {
            raw_bytes_hex: hex::encode(raw),
        }
    }

    /// Recovers the original bytes.
    pub fn raw_bytes(&self) -> std::result::Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.raw_bytes_hex)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeadLetter {
    Undecodable(RawBytesWrapper),
    Exhausted(Order),
}

impl DeadLetter {
    pub fn undecodable(raw: &[u8]) -> Self {
        DeadLetter::Undecodable(RawBytesWrapper::new(raw))
    }

    pub fn to_payload(&self) -> Result<Vec<u8>> {
        let payload = match self {
            DeadLetter::Undecodable(wrapper) => serde_json::to_vec(wrapper)?,
            DeadLetter::Exhausted(order) => serde_json::to_vec(order)?,
        };
        Ok(payload)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            DeadLetter::Undecodable(_) => "undecodable",
            DeadLetter::Exhausted(_) => "retries_exhausted",
        }
    }
}
