//! Message metadata and the retry counter carried inside it.
//!
//! The retry count lives in the message itself as a `retry` header whose
//! value is the decimal attempt count. There is no external retry store.

use tracing::debug;

/// Header key holding the attempt count.
pub const RETRY_HEADER: &str = "retry";

/// A single metadata entry. Values may be null on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub key: String,
    pub value: Option<Vec<u8>>,
}

/// Ordered message metadata. Keys are not required to be unique.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Headers {
    entries: Vec<Header>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.push(key, Some(value.into()));
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: Option<Vec<u8>>) {
        self.entries.push(Header {
            key: key.into(),
            value,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|h| h.key == key)
            .and_then(|h| h.value.as_deref())
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|h| h.key.as_str()).collect()
    }
}

impl FromIterator<(String, Option<Vec<u8>>)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, Option<Vec<u8>>)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| Header { key, value })
                .collect(),
        }
    }
}

/// Reads the attempt count from the `retry` header.
///
/// Absent, null, or unparsable values all count as 0; a malformed counter
/// must never stop the pipeline.
pub fn extract_retry_count(headers: &Headers) -> u32 {
    let Some(header) = headers.iter().find(|h| h.key == RETRY_HEADER) else {
        return 0;
    };

    let parsed = header
        .value
        .as_deref()
        .and_then(|raw| std::str::from_utf8(raw).ok())
        .and_then(|s| s.trim().parse::<u32>().ok());

    match parsed {
        Some(count) => count,
        None => {
            debug!(value = ?header.value, "Ignoring malformed retry header");
            0
        }
    }
}

/// Returns a copy of `headers` with the retry count set to `count`.
///
/// An existing `retry` entry is rewritten where it stands, so every other
/// entry keeps its position; otherwise `retry` is appended at the end.
pub fn set_retry_count(headers: &Headers, count: u32) -> Headers {
    let value = count.to_string().into_bytes();
    let mut found = false;

    let mut entries: Vec<Header> = headers
        .iter()
        .map(|h| {
            if h.key == RETRY_HEADER {
                found = true;
                Header {
                    key: h.key.clone(),
                    value: Some(value.clone()),
                }
            } else {
                h.clone()
            }
        })
        .collect();

    if !found {
        entries.push(Header {
            key: RETRY_HEADER.to_string(),
            value: Some(value),
        });
    }

    Headers { entries }
}
