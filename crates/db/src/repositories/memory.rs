use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use smartshop_core::domain::analytics::{CategoryPairing, PricePoint};
use smartshop_core::domain::customer::{CustomerId, CustomerProfile};
use smartshop_core::domain::product::{ProductId, ProductRecord};
use smartshop_core::gateway::{CustomerFilter, ProductFilter};

use super::{
    average_by_period, sort_pairings, CustomerRepository, PairingRepository, ProductRepository,
    RepositoryError,
};

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<BTreeMap<String, CustomerProfile>>,
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_id(
        &self,
        id: &CustomerId,
    ) -> Result<Option<CustomerProfile>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers.get(&id.0).cloned())
    }

    async fn list(&self, filter: &CustomerFilter) -> Result<Vec<CustomerProfile>, RepositoryError> {
        let customers = self.customers.read().await;
        let matching = customers.values().filter(|customer| filter.matches(customer)).cloned();
        Ok(match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn save(&self, customer: CustomerProfile) -> Result<(), RepositoryError> {
        let mut customers = self.customers.write().await;
        customers.insert(customer.id.0.clone(), customer);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<BTreeMap<String, ProductRecord>>,
    prices: RwLock<HashMap<(String, String), Decimal>>,
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<ProductRecord>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(&id.0).cloned())
    }

    async fn list(&self, filter: &ProductFilter) -> Result<Vec<ProductRecord>, RepositoryError> {
        let products = self.products.read().await;
        let matching = products.values().filter(|product| filter.matches(product)).cloned();
        Ok(match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn save(&self, product: ProductRecord) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert(product.id.0.clone(), product);
        Ok(())
    }

    async fn record_price(
        &self,
        product_id: &ProductId,
        period: &str,
        price: Decimal,
    ) -> Result<(), RepositoryError> {
        let mut prices = self.prices.write().await;
        prices.insert((product_id.0.clone(), period.to_owned()), price);
        Ok(())
    }

    async fn price_history(&self, category: &str) -> Result<Vec<PricePoint>, RepositoryError> {
        let products = self.products.read().await;
        let prices = self.prices.read().await;
        let rows = prices
            .iter()
            .filter(|((product_id, _), _)| {
                products.get(product_id).is_some_and(|product| product.in_category(category))
            })
            .map(|((_, period), price)| (period.clone(), *price));
        Ok(average_by_period(rows))
    }
}

#[derive(Default)]
pub struct InMemoryPairingRepository {
    pairings: RwLock<Vec<CategoryPairing>>,
}

#[async_trait]
impl PairingRepository for InMemoryPairingRepository {
    async fn list_for_category(
        &self,
        category: &str,
    ) -> Result<Vec<CategoryPairing>, RepositoryError> {
        let pairings = self.pairings.read().await;
        let mut matching: Vec<CategoryPairing> = pairings
            .iter()
            .filter(|pairing| pairing.category.trim().eq_ignore_ascii_case(category.trim()))
            .cloned()
            .collect();
        sort_pairings(&mut matching);
        Ok(matching)
    }

    async fn save(&self, pairing: CategoryPairing) -> Result<(), RepositoryError> {
        let mut pairings = self.pairings.write().await;
        pairings.retain(|existing| {
            !(existing.category.eq_ignore_ascii_case(&pairing.category)
                && existing.paired_category.eq_ignore_ascii_case(&pairing.paired_category))
        });
        pairings.push(pairing);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use smartshop_core::domain::analytics::CategoryPairing;
    use smartshop_core::domain::product::{ProductId, ProductRecord};
    use smartshop_core::gateway::ProductFilter;

    use crate::repositories::{
        InMemoryPairingRepository, InMemoryProductRepository, PairingRepository,
        ProductRepository,
    };

    fn product(id: &str, category: &str) -> ProductRecord {
        ProductRecord {
            id: ProductId::from(id),
            category: category.to_owned(),
            subcategory: "Biography".to_owned(),
            brand: "Publishers Inc".to_owned(),
            price: Decimal::new(2499, 2),
            rating: 4.4,
            avg_similar_rating: 4.3,
            sentiment_score: 0.82,
            seasons: Vec::new(),
            occasions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn in_memory_product_repo_round_trip() {
        let repo = InMemoryProductRepository::default();
        let record = product("P2002", "Books");

        repo.save(record.clone()).await.expect("save product");
        let found = repo.find_by_id(&record.id).await.expect("find product");

        assert_eq!(found, Some(record));
    }

    #[tokio::test]
    async fn in_memory_list_is_ordered_and_limited() {
        let repo = InMemoryProductRepository::default();
        for id in ["P3", "P1", "P2"] {
            repo.save(product(id, "Books")).await.expect("save");
        }

        let listed = repo
            .list(&ProductFilter { limit: Some(2), ..ProductFilter::category("books") })
            .await
            .expect("list");

        let ids: Vec<_> = listed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "P2"]);
    }

    #[tokio::test]
    async fn pairings_replace_and_sort_strongest_first() {
        let repo = InMemoryPairingRepository::default();
        for (paired, count) in [("Home Decor", 3), ("Electronics", 9), ("Home Decor", 5)] {
            repo.save(CategoryPairing {
                category: "Books".to_owned(),
                paired_category: paired.to_owned(),
                co_occurrence_count: count,
            })
            .await
            .expect("save pairing");
        }

        let pairings = repo.list_for_category("books").await.expect("list");
        assert_eq!(pairings.len(), 2);
        assert_eq!(pairings[0].paired_category, "Electronics");
        assert_eq!(pairings[1].co_occurrence_count, 5);
    }
}
