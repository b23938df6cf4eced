use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stock counter for one (product, size) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductSize {
    pub id: i64,
    pub tracking_id: String,
    pub product_id: i64,
    pub size_id: i64,
    pub stock_quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product size joined with the product fields the cart needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SellableUnit {
    pub tracking_id: String,
    pub product_id: i64,
    pub product_name: String,
    pub price: Decimal,
    pub stock_quantity: u32,
}

impl SellableUnit {
    pub fn can_supply(&self, quantity: u32) -> bool {
        self.stock_quantity >= quantity
    }
}

/// Builds the human-readable tracking id for a new product size.
pub fn tracking_id_for(product_name: &str, product_id: i64, size_id: i64) -> String {
    let prefix: String = product_name
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    format!("{prefix}-{product_id}-{size_id}")
}
