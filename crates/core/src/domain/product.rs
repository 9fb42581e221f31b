use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::context::Season;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBand {
    Budget,
    Mid,
    Premium,
    Luxury,
}

impl PriceBand {
    pub fn from_price(price: Decimal) -> Self {
        if price < Decimal::from(50) {
            Self::Budget
        } else if price < Decimal::from(200) {
            Self::Mid
        } else if price < Decimal::from(1000) {
            Self::Premium
        } else {
            Self::Luxury
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Self::Budget => 0,
            Self::Mid => 1,
            Self::Premium => 2,
            Self::Luxury => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Mid => "mid",
            Self::Premium => "premium",
            Self::Luxury => "luxury",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub category: String,
    pub subcategory: String,
    pub brand: String,
    pub price: Decimal,
    /// Average customer rating, 0 to 5.
    pub rating: f64,
    /// Average rating of similar products.
    pub avg_similar_rating: f64,
    pub sentiment_score: f64,
    #[serde(default)]
    pub seasons: Vec<Season>,
    #[serde(default)]
    pub occasions: Vec<String>,
}

impl ProductRecord {
    pub fn price_band(&self) -> PriceBand {
        PriceBand::from_price(self.price)
    }

    pub fn in_category(&self, category: &str) -> bool {
        self.category.trim().eq_ignore_ascii_case(category.trim())
    }

    pub fn fits_season(&self, season: Season) -> bool {
        self.seasons.contains(&season)
    }

    pub fn fits_occasion(&self, occasion: &str) -> bool {
        crate::domain::customer::contains_ignore_case(&self.occasions, occasion)
    }

    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            category: self.category.clone(),
            subcategory: self.subcategory.clone(),
            brand: self.brand.clone(),
            price: self.price,
            rating: self.rating,
        }
    }
}

/// Display fields carried alongside a scored candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub category: String,
    pub subcategory: String,
    pub brand: String,
    pub price: Decimal,
    pub rating: f64,
}
