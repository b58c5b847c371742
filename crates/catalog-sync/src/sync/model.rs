//! Product record

use serde::{Deserialize, Serialize};

/// Cache key prefix of a product snapshot
pub const PRODUCT_KEY_PREFIX: &str = "product:";

/// One product row of an upload
///
/// Field names double as the CSV header names and the keys of the cached
/// JSON snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub price: f64,
    pub quantity: i64,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        image: impl Into<String>,
        price: f64,
        quantity: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: image.into(),
            price,
            quantity,
        }
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }

    /// Finite and non-negative; NaN and infinities are rejected.
    pub fn has_valid_price(&self) -> bool {
        self.price.is_finite() && self.price >= 0.0
    }

    pub fn has_valid_quantity(&self) -> bool {
        self.quantity >= 0
    }

    /// True when every business rule holds
    pub fn is_valid(&self) -> bool {
        self.has_id() && self.has_name() && self.has_valid_price() && self.has_valid_quantity()
    }

    /// `product:<id>`
    pub fn cache_key(&self) -> String {
        format!("{PRODUCT_KEY_PREFIX}{}", self.id)
    }
}
