use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{PriceBand, ProductId};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CustomerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Read-only snapshot of a shopper as seen by the agents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: CustomerId,
    pub age: u32,
    pub gender: String,
    pub location: String,
    pub segment: String,
    pub avg_order_value: Decimal,
    /// Category names the customer has browsed.
    pub browsing_history: Vec<String>,
    /// Category or subcategory names the customer has bought from.
    pub purchase_history: Vec<String>,
    /// Explicit already-purchased markers. Empty when the source has none.
    #[serde(default)]
    pub purchased_products: Vec<ProductId>,
}

impl CustomerProfile {
    pub fn age_band(&self) -> String {
        let floor = (self.age / 10) * 10;
        format!("{floor}-{}", floor + 9)
    }

    pub fn preferred_price_band(&self) -> PriceBand {
        PriceBand::from_price(self.avg_order_value)
    }

    pub fn has_purchased(&self, product_id: &ProductId) -> bool {
        self.purchased_products.iter().any(|id| id == product_id)
    }

    pub fn browsed(&self, category: &str) -> bool {
        contains_ignore_case(&self.browsing_history, category)
    }

    pub fn purchased_from(&self, name: &str) -> bool {
        contains_ignore_case(&self.purchase_history, name)
    }
}

/// Peer shopper surfaced by customer analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarCustomer {
    pub customer_id: CustomerId,
    pub segment: String,
    pub location: String,
    pub age: u32,
    pub avg_order_value: Decimal,
    pub similarity: f64,
}

pub(crate) fn contains_ignore_case(values: &[String], needle: &str) -> bool {
    let needle = needle.trim();
    !needle.is_empty() && values.iter().any(|value| value.trim().eq_ignore_ascii_case(needle))
}
