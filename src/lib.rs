pub mod codec;
pub mod config;
pub mod consumer;
pub mod dead_letter;
pub mod dispatcher;
pub mod error;
pub mod headers;
pub mod message;
pub mod order;
pub mod processor;
pub mod producer;

pub mod kafka;

pub use crate::config::Config;
pub use consumer::OrderConsumer;
pub use dispatcher::{Dispatcher, Outcome};
pub use error::{Error, Result};
pub use order::Order;
pub use producer::OrderProducer;
