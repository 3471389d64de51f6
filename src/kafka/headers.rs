use crate::headers::Headers;
use rdkafka::message::{Header, OwnedHeaders};

/// Copies rdkafka headers into [`Headers`], keeping their order.
pub fn from_kafka<H: rdkafka::message::Headers>(headers: Option<&H>) -> Headers {
    match headers {
        Some(headers) => headers
            .iter()
            .map(|h| (h.key.to_string(), h.value.map(|v| v.to_vec())))
            .collect(),
        None => Headers::new(),
    }
}

pub fn to_kafka(headers: &Headers) -> OwnedHeaders {
    headers.iter().fold(OwnedHeaders::new_with_capacity(headers.len()), |acc, h| {
        acc.insert(Header {
            key: h.key.as_str(),
            value: h.value.as_deref(),
        })
    })
}
