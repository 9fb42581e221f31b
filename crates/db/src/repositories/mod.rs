use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use smartshop_core::domain::analytics::{CategoryPairing, PricePoint};
use smartshop_core::domain::customer::{CustomerId, CustomerProfile};
use smartshop_core::domain::product::{ProductId, ProductRecord};
use smartshop_core::gateway::{CustomerFilter, GatewayError, ProductFilter};

pub mod customer;
pub mod gateway;
pub mod memory;
pub mod pairing;
pub mod product;

pub use customer::SqlCustomerRepository;
pub use gateway::{CatalogGateway, InMemoryDataGateway, SqlDataGateway};
pub use memory::{
    InMemoryCustomerRepository, InMemoryPairingRepository, InMemoryProductRepository,
};
pub use pairing::SqlPairingRepository;
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for GatewayError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => Self::Backend(error.to_string()),
            RepositoryError::Decode(message) => Self::Decode(message),
        }
    }
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: &CustomerId)
        -> Result<Option<CustomerProfile>, RepositoryError>;
    async fn list(&self, filter: &CustomerFilter) -> Result<Vec<CustomerProfile>, RepositoryError>;
    async fn save(&self, customer: CustomerProfile) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<ProductRecord>, RepositoryError>;
    async fn list(&self, filter: &ProductFilter) -> Result<Vec<ProductRecord>, RepositoryError>;
    async fn save(&self, product: ProductRecord) -> Result<(), RepositoryError>;
    async fn record_price(
        &self,
        product_id: &ProductId,
        period: &str,
        price: Decimal,
    ) -> Result<(), RepositoryError>;
    /// Monthly average price across the category's products, oldest period first.
    async fn price_history(&self, category: &str) -> Result<Vec<PricePoint>, RepositoryError>;
}

#[async_trait]
pub trait PairingRepository: Send + Sync {
    async fn list_for_category(&self, category: &str)
        -> Result<Vec<CategoryPairing>, RepositoryError>;
    async fn save(&self, pairing: CategoryPairing) -> Result<(), RepositoryError>;
}

/// Averages `(period, price)` rows per period, ordered by period.
pub(crate) fn average_by_period(rows: impl IntoIterator<Item = (String, Decimal)>) -> Vec<PricePoint> {
    let mut totals: std::collections::BTreeMap<String, (Decimal, u64)> =
        std::collections::BTreeMap::new();
    for (period, price) in rows {
        let entry = totals.entry(period).or_insert((Decimal::ZERO, 0));
        entry.0 += price;
        entry.1 += 1;
    }

    totals
        .into_iter()
        .map(|(period, (total, count))| PricePoint {
            period,
            average_price: (total / Decimal::from(count.max(1))).round_dp(2),
        })
        .collect()
}

/// Orders pairings strongest first, ties by paired category name.
pub(crate) fn sort_pairings(pairings: &mut [CategoryPairing]) {
    pairings.sort_by(|a, b| {
        b.co_occurrence_count
            .cmp(&a.co_occurrence_count)
            .then_with(|| a.paired_category.cmp(&b.paired_category))
    });
}
