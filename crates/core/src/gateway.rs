//! Read-only access to customer and catalog data.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::analytics::{CategoryAggregate, CategoryPairing};
use crate::domain::customer::{CustomerId, CustomerProfile};
use crate::domain::product::{ProductId, ProductRecord};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway backend failure: {0}")]
    Backend(String),
    #[error("could not decode stored record: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub exclude_category: Option<String>,
    pub limit: Option<usize>,
}

impl ProductFilter {
    pub fn category(category: impl Into<String>) -> Self {
        Self { category: Some(category.into()), ..Self::default() }
    }

    pub fn matches(&self, product: &ProductRecord) -> bool {
        let included = self.category.as_deref().map_or(true, |category| product.in_category(category));
        let excluded =
            self.exclude_category.as_deref().map_or(false, |category| product.in_category(category));
        included && !excluded
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomerFilter {
    pub segment: Option<String>,
    pub location: Option<String>,
    pub limit: Option<usize>,
}

impl CustomerFilter {
    pub fn matches(&self, customer: &CustomerProfile) -> bool {
        let segment_ok = self
            .segment
            .as_deref()
            .map_or(true, |segment| customer.segment.eq_ignore_ascii_case(segment.trim()));
        let location_ok = self
            .location
            .as_deref()
            .map_or(true, |location| customer.location.eq_ignore_ascii_case(location.trim()));
        segment_ok && location_ok
    }
}

#[async_trait]
pub trait DataGateway: Send + Sync {
    async fn get_customer(&self, id: &CustomerId) -> Result<Option<CustomerProfile>, GatewayError>;
    async fn get_product(&self, id: &ProductId) -> Result<Option<ProductRecord>, GatewayError>;
    /// Products matching `filter`, ordered by product id.
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<ProductRecord>, GatewayError>;
    /// Customers matching `filter`, ordered by customer id.
    async fn list_customers(
        &self,
        filter: &CustomerFilter,
    ) -> Result<Vec<CustomerProfile>, GatewayError>;
    async fn category_aggregate(&self, category: &str) -> Result<CategoryAggregate, GatewayError>;
    /// Co-occurrence rows for `category`, strongest first. Empty when no history exists.
    async fn category_pairings(&self, category: &str) -> Result<Vec<CategoryPairing>, GatewayError>;
}
