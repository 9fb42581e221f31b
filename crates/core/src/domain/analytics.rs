use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use std::collections::BTreeSet;

use crate::domain::product::{ProductId, ProductRecord};

/// Number of products listed in `trending_products` and `popularity`.
pub const TRENDING_LIMIT: usize = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Period label, `YYYY-MM` or `current` when no history exists.
    pub period: String,
    pub average_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopularityPoint {
    pub product_id: ProductId,
    pub label: String,
    /// Rating scaled onto 0..=100.
    pub popularity: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendingProduct {
    pub product_id: ProductId,
    pub subcategory: String,
    pub brand: String,
    pub price: Decimal,
    pub rating: f64,
}

/// Catalog statistics for one category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryAggregate {
    pub category: String,
    pub product_count: usize,
    pub average_price: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub average_rating: f64,
    pub subcategories: Vec<String>,
    pub price_trend: Vec<PricePoint>,
    pub popularity: Vec<PopularityPoint>,
    pub trending_products: Vec<TrendingProduct>,
}

impl CategoryAggregate {
    pub fn empty(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            product_count: 0,
            average_price: Decimal::ZERO,
            min_price: Decimal::ZERO,
            max_price: Decimal::ZERO,
            average_rating: 0.0,
            subcategories: Vec::new(),
            price_trend: Vec::new(),
            popularity: Vec::new(),
            trending_products: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.product_count == 0
    }

    /// Builds the aggregate from the category's products. `price_history` is
    /// monthly averages, oldest first; an empty history falls back to one
    /// `current` point at the average price.
    pub fn from_products(
        category: &str,
        products: &[ProductRecord],
        price_history: Vec<PricePoint>,
    ) -> Self {
        let members: Vec<&ProductRecord> =
            products.iter().filter(|product| product.in_category(category)).collect();
        if members.is_empty() {
            return Self::empty(category);
        }

        let count = members.len();
        let total_price: Decimal = members.iter().map(|product| product.price).sum();
        let average_price = (total_price / Decimal::from(count as u64)).round_dp(2);
        let min_price = members.iter().map(|product| product.price).min().unwrap_or_default();
        let max_price = members.iter().map(|product| product.price).max().unwrap_or_default();
        let average_rating =
            members.iter().map(|product| product.rating).sum::<f64>() / count as f64;
        let subcategories: BTreeSet<String> =
            members.iter().map(|product| product.subcategory.clone()).collect();

        let mut ranked = members.clone();
        ranked.sort_by(|a, b| {
            b.rating.partial_cmp(&a.rating).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.id.cmp(&b.id))
        });
        ranked.truncate(TRENDING_LIMIT);

        let trending_products: Vec<TrendingProduct> = ranked
            .iter()
            .map(|product| TrendingProduct {
                product_id: product.id.clone(),
                subcategory: product.subcategory.clone(),
                brand: product.brand.clone(),
                price: product.price,
                rating: product.rating,
            })
            .collect();
        let popularity = ranked
            .iter()
            .map(|product| PopularityPoint {
                product_id: product.id.clone(),
                label: format!("{} {}", product.brand, product.subcategory),
                popularity: (product.rating * 20.0).clamp(0.0, 100.0),
            })
            .collect();
        let price_trend = if price_history.is_empty() {
            vec![PricePoint { period: "current".to_owned(), average_price }]
        } else {
            price_history
        };

        Self {
            category: members[0].category.clone(),
            product_count: count,
            average_price,
            min_price,
            max_price,
            average_rating,
            subcategories: subcategories.into_iter().collect(),
            price_trend,
            popularity,
            trending_products,
        }
    }
}

/// Historical co-occurrence of two categories in the same orders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPairing {
    pub category: String,
    pub paired_category: String,
    pub co_occurrence_count: u32,
}
