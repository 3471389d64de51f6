//! The pluggable processing step and the consumer-owned running average.

use crate::order::Order;
use thiserror::Error;

/// A failure reported by the processing step.
///
/// The retry machinery treats every failure as transient; the cause is
/// carried only for logging.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{cause}")]
pub struct ProcessingError {
    pub cause: String,
}

impl ProcessingError {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }
}

/// Domain logic applied to each decoded order.
///
/// Implementations must not have effects visible outside the call when
/// they fail.
pub trait OrderProcessor: Send + Sync {
    fn process(&self, order: &Order) -> Result<(), ProcessingError>;
}

impl<F> OrderProcessor for F
where
    F: Fn(&Order) -> Result<(), ProcessingError> + Send + Sync,
{
    fn process(&self, order: &Order) -> Result<(), ProcessingError> {
        self(order)
    }
}

pub const DEFAULT_PRICE_THRESHOLD: f64 = 95.0;

/// Rejects every order priced above a threshold.
///
/// This is the deterministic failure used to drive the retry path.
#[derive(Debug, Clone, Copy)]
pub struct PriceThresholdProcessor {
    pub threshold: f64,
}

impl Default for PriceThresholdProcessor {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PRICE_THRESHOLD,
        }
    }
}

impl OrderProcessor for PriceThresholdProcessor {
    fn process(&self, order: &Order) -> Result<(), ProcessingError> {
        if order.price > self.threshold {
            return Err(ProcessingError::new(format!(
                "simulated processing error for high price {:.2} (threshold {:.2})",
                order.price, self.threshold
            )));
        }
        Ok(())
    }
}

/// Running sum and count of successfully processed prices.
///
/// Lives only as long as the consumer that owns it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningAverage {
    sum: f64,
    count: u64,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, price: f64) -> f64 {
        self.sum += price;
        self.count += 1;
        self.average()
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }
}
