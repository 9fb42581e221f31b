use async_trait::async_trait;
use tracing::debug;

use smartshop_core::domain::analytics::{CategoryAggregate, CategoryPairing};
use smartshop_core::domain::customer::{CustomerId, CustomerProfile};
use smartshop_core::domain::product::{ProductId, ProductRecord};
use smartshop_core::gateway::{CustomerFilter, DataGateway, GatewayError, ProductFilter};

use super::{
    CustomerRepository, InMemoryCustomerRepository, InMemoryPairingRepository,
    InMemoryProductRepository, PairingRepository, ProductRepository, SqlCustomerRepository,
    SqlPairingRepository, SqlProductRepository,
};
use crate::DbPool;

/// `DataGateway` over a set of repositories.
pub struct CatalogGateway<C, P, K> {
    customers: C,
    products: P,
    pairings: K,
}

pub type SqlDataGateway =
    CatalogGateway<SqlCustomerRepository, SqlProductRepository, SqlPairingRepository>;

pub type InMemoryDataGateway =
    CatalogGateway<InMemoryCustomerRepository, InMemoryProductRepository, InMemoryPairingRepository>;

impl<C, P, K> CatalogGateway<C, P, K> {
    pub fn new(customers: C, products: P, pairings: K) -> Self {
        Self { customers, products, pairings }
    }

    pub fn customers(&self) -> &C {
        &self.customers
    }

    pub fn products(&self) -> &P {
        &self.products
    }

    pub fn pairings(&self) -> &K {
        &self.pairings
    }
}

impl SqlDataGateway {
    pub fn from_pool(pool: DbPool) -> Self {
        Self::new(
            SqlCustomerRepository::new(pool.clone()),
            SqlProductRepository::new(pool.clone()),
            SqlPairingRepository::new(pool),
        )
    }
}

impl Default for InMemoryDataGateway {
    fn default() -> Self {
        Self::new(
            InMemoryCustomerRepository::default(),
            InMemoryProductRepository::default(),
            InMemoryPairingRepository::default(),
        )
    }
}

#[async_trait]
impl<C, P, K> DataGateway for CatalogGateway<C, P, K>
where
    C: CustomerRepository,
    P: ProductRepository,
    K: PairingRepository,
{
    async fn get_customer(&self, id: &CustomerId) -> Result<Option<CustomerProfile>, GatewayError> {
        Ok(self.customers.find_by_id(id).await?)
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<ProductRecord>, GatewayError> {
        Ok(self.products.find_by_id(id).await?)
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<ProductRecord>, GatewayError> {
        Ok(self.products.list(filter).await?)
    }

    async fn list_customers(
        &self,
        filter: &CustomerFilter,
    ) -> Result<Vec<CustomerProfile>, GatewayError> {
        Ok(self.customers.list(filter).await?)
    }

    async fn category_aggregate(&self, category: &str) -> Result<CategoryAggregate, GatewayError> {
        let products = self.products.list(&ProductFilter::category(category)).await?;
        let history = self.products.price_history(category).await?;
        let aggregate = CategoryAggregate::from_products(category, &products, history);
        debug!(
            event_name = "gateway.category_aggregate.built",
            category,
            product_count = aggregate.product_count,
            "category aggregate built"
        );
        Ok(aggregate)
    }

    async fn category_pairings(&self, category: &str) -> Result<Vec<CategoryPairing>, GatewayError> {
        Ok(self.pairings.list_for_category(category).await?)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use smartshop_core::domain::analytics::CategoryPairing;
    use smartshop_core::domain::customer::{CustomerId, CustomerProfile};
    use smartshop_core::domain::product::{ProductId, ProductRecord};
    use smartshop_core::gateway::{CustomerFilter, DataGateway};

    use super::{InMemoryDataGateway, SqlDataGateway};
    use crate::repositories::{CustomerRepository, PairingRepository, ProductRepository};
    use crate::{connect_with_settings, migrations};

    fn product(id: &str, category: &str, price: i64, rating: f64) -> ProductRecord {
        ProductRecord {
            id: ProductId::from(id),
            category: category.to_owned(),
            subcategory: "Smartphone".to_owned(),
            brand: "TechBrand".to_owned(),
            price: Decimal::from(price),
            rating,
            avg_similar_rating: 4.5,
            sentiment_score: 0.85,
            seasons: Vec::new(),
            occasions: Vec::new(),
        }
    }

    fn customer(id: &str) -> CustomerProfile {
        CustomerProfile {
            id: CustomerId::from(id),
            age: 28,
            gender: "Female".to_owned(),
            location: "New York".to_owned(),
            segment: "New Visitor".to_owned(),
            avg_order_value: Decimal::from(1500),
            browsing_history: vec!["Books".to_owned()],
            purchase_history: vec!["Biography".to_owned()],
            purchased_products: Vec::new(),
        }
    }

    #[tokio::test]
    async fn sql_gateway_builds_aggregate_with_price_trend() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let gateway = SqlDataGateway::from_pool(pool);

        gateway.products().save(product("P1", "Electronics", 1000, 4.7)).await.expect("save");
        gateway.products().save(product("P2", "Electronics", 500, 4.0)).await.expect("save");
        gateway
            .products()
            .record_price(&ProductId::from("P1"), "2024-03", Decimal::from(1100))
            .await
            .expect("record price");

        let aggregate = gateway.category_aggregate("electronics").await.expect("aggregate");

        assert_eq!(aggregate.product_count, 2);
        assert_eq!(aggregate.average_price, Decimal::from(750));
        assert_eq!(aggregate.price_trend.len(), 1);
        assert_eq!(aggregate.price_trend[0].period, "2024-03");
        assert_eq!(aggregate.trending_products[0].product_id, ProductId::from("P1"));
    }

    #[tokio::test]
    async fn in_memory_gateway_serves_all_reads() {
        let gateway = InMemoryDataGateway::default();
        gateway.customers().save(customer("C1000")).await.expect("save customer");
        gateway.products().save(product("P1", "Electronics", 999, 4.7)).await.expect("save");
        gateway
            .pairings()
            .save(CategoryPairing {
                category: "Electronics".to_owned(),
                paired_category: "Fitness".to_owned(),
                co_occurrence_count: 4,
            })
            .await
            .expect("save pairing");

        assert!(gateway.get_customer(&CustomerId::from("C1000")).await.expect("read").is_some());
        assert!(gateway.get_customer(&CustomerId::from("C404")).await.expect("read").is_none());
        assert!(gateway.get_product(&ProductId::from("P1")).await.expect("read").is_some());
        assert_eq!(gateway.list_customers(&CustomerFilter::default()).await.expect("list").len(), 1);
        assert_eq!(gateway.category_pairings("electronics").await.expect("pairings").len(), 1);

        let empty = gateway.category_aggregate("Garden").await.expect("aggregate");
        assert!(empty.is_empty());
    }
}
