use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Product labels used by the synthetic order generator.
pub const PRODUCTS: [&str; 4] = ["Item1", "Item2", "Item3", "Item4"];

/// An order event as it flows through the pipeline.
///
/// Field names on the wire follow the shared schema (`orderId`, `product`,
/// `price`), so the struct is renamed to camelCase for serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub product: String,
    pub price: f64,
}

impl Order {
    pub fn new(order_id: impl Into<String>, product: impl Into<String>, price: f64) -> Self {
        Self {
            order_id: order_id.into(),
            product: product.into(),
            price,
        }
    }

    /// Generates a random order: fresh UUID, one of [`PRODUCTS`], and a
    /// price in `[5.0, 120.0]` rounded to cents.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let product = PRODUCTS.choose(rng).copied().unwrap_or(PRODUCTS[0]);
        let price: f64 = rng.gen_range(5.0..=120.0);

        Self {
            order_id: uuid::Uuid::new_v4().to_string(),
            product: product.to_string(),
            price: (price * 100.0).round() / 100.0,
        }
    }
}
