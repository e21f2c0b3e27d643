use serde::{Deserialize, Serialize};

/// A subscription price with its product expanded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Price {
    pub id: String,
    pub currency: String,
    /// Amount in the currency's minor unit (cents for USD).
    pub unit_amount: Option<i64>,
    #[serde(default)]
    pub recurring: Option<Recurring>,
    pub product: Product,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recurring {
    pub interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Stripe list envelope.
#[derive(Debug, Deserialize)]
pub struct PriceList {
    pub data: Vec<Price>,
}
