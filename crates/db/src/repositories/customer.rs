use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use smartshop_core::domain::customer::{CustomerId, CustomerProfile};
use smartshop_core::domain::product::ProductId;
use smartshop_core::gateway::CustomerFilter;

use super::{CustomerRepository, RepositoryError};
use crate::DbPool;

const CUSTOMER_COLUMNS: &str = r#"
    id,
    age,
    gender,
    location,
    segment,
    CAST(avg_order_value AS TEXT) AS avg_order_value_text,
    browsing_history_json,
    purchase_history_json
"#;

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn purchased_products(&self, id: &str) -> Result<Vec<ProductId>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT product_id FROM customer_purchases WHERE customer_id = ? ORDER BY product_id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("product_id").map(ProductId))
            .collect::<Result<Vec<_>, _>>()
            .map_err(RepositoryError::from)
    }

    async fn hydrate(&self, row: SqliteRow) -> Result<CustomerProfile, RepositoryError> {
        let mut profile = customer_from_row(&row)?;
        profile.purchased_products = self.purchased_products(&profile.id.0).await?;
        Ok(profile)
    }
}

#[async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find_by_id(
        &self,
        id: &CustomerId,
    ) -> Result<Option<CustomerProfile>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &CustomerFilter) -> Result<Vec<CustomerProfile>, RepositoryError> {
        let limit = filter.limit.map(|limit| limit as i64).unwrap_or(-1);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CUSTOMER_COLUMNS}
            FROM customers
            WHERE (? IS NULL OR segment = ? COLLATE NOCASE)
              AND (? IS NULL OR location = ? COLLATE NOCASE)
            ORDER BY id
            LIMIT ?
            "#
        ))
        .bind(filter.segment.as_deref())
        .bind(filter.segment.as_deref())
        .bind(filter.location.as_deref())
        .bind(filter.location.as_deref())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut customers = Vec::with_capacity(rows.len());
        for row in rows {
            customers.push(self.hydrate(row).await?);
        }
        Ok(customers)
    }

    async fn save(&self, customer: CustomerProfile) -> Result<(), RepositoryError> {
        let browsing = encode_json(&customer.browsing_history)?;
        let purchases = encode_json(&customer.purchase_history)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, age, gender, location, segment, avg_order_value,
                browsing_history_json, purchase_history_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                age = excluded.age,
                gender = excluded.gender,
                location = excluded.location,
                segment = excluded.segment,
                avg_order_value = excluded.avg_order_value,
                browsing_history_json = excluded.browsing_history_json,
                purchase_history_json = excluded.purchase_history_json
            "#,
        )
        .bind(&customer.id.0)
        .bind(i64::from(customer.age))
        .bind(&customer.gender)
        .bind(&customer.location)
        .bind(&customer.segment)
        .bind(customer.avg_order_value.to_string())
        .bind(browsing)
        .bind(purchases)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM customer_purchases WHERE customer_id = ?")
            .bind(&customer.id.0)
            .execute(&mut *tx)
            .await?;
        for product_id in &customer.purchased_products {
            sqlx::query(
                "INSERT OR IGNORE INTO customer_purchases (customer_id, product_id) VALUES (?, ?)",
            )
            .bind(&customer.id.0)
            .bind(&product_id.0)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn customer_from_row(row: &SqliteRow) -> Result<CustomerProfile, RepositoryError> {
    let id: String = row.try_get("id")?;
    let age_raw: i64 = row.try_get("age")?;
    let age = u32::try_from(age_raw)
        .map_err(|_| RepositoryError::Decode(format!("customer `{id}` has invalid age {age_raw}")))?;
    let avg_order_value_text: String = row.try_get("avg_order_value_text")?;
    let avg_order_value = Decimal::from_str(avg_order_value_text.trim()).map_err(|error| {
        RepositoryError::Decode(format!("customer `{id}` avg_order_value: {error}"))
    })?;

    Ok(CustomerProfile {
        age,
        gender: row.try_get("gender")?,
        location: row.try_get("location")?,
        segment: row.try_get("segment")?,
        avg_order_value,
        browsing_history: decode_json(&row.try_get::<String, _>("browsing_history_json")?, &id)?,
        purchase_history: decode_json(&row.try_get::<String, _>("purchase_history_json")?, &id)?,
        purchased_products: Vec::new(),
        id: CustomerId(id),
    })
}

pub(crate) fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|error| RepositoryError::Decode(error.to_string()))
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    raw: &str,
    owner: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(raw)
        .map_err(|error| RepositoryError::Decode(format!("record `{owner}`: {error}")))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use smartshop_core::domain::customer::{CustomerId, CustomerProfile};
    use smartshop_core::domain::product::ProductId;
    use smartshop_core::gateway::CustomerFilter;

    use super::SqlCustomerRepository;
    use crate::repositories::CustomerRepository;
    use crate::{connect_with_settings, migrations};

    fn profile(id: &str, segment: &str, location: &str) -> CustomerProfile {
        CustomerProfile {
            id: CustomerId::from(id),
            age: 35,
            gender: "Male".to_owned(),
            location: location.to_owned(),
            segment: segment.to_owned(),
            avg_order_value: Decimal::new(250050, 2),
            browsing_history: vec!["Electronics".to_owned(), "Fitness".to_owned()],
            purchase_history: vec!["Smartphone".to_owned()],
            purchased_products: vec![ProductId::from("P2000")],
        }
    }

    async fn repository() -> SqlCustomerRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlCustomerRepository::new(pool)
    }

    #[tokio::test]
    async fn save_and_find_preserves_history_and_decimal() {
        let repo = repository().await;
        let customer = profile("C1001", "Frequent Buyer", "San Francisco");

        repo.save(customer.clone()).await.expect("save customer");
        let found = repo.find_by_id(&customer.id).await.expect("find customer");

        assert_eq!(found, Some(customer));
    }

    #[tokio::test]
    async fn missing_customer_is_none() {
        let repo = repository().await;
        let found = repo.find_by_id(&CustomerId::from("nobody")).await.expect("query");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn list_filters_by_segment_case_insensitively() {
        let repo = repository().await;
        repo.save(profile("C2", "Frequent Buyer", "Chicago")).await.expect("save");
        repo.save(profile("C1", "frequent buyer", "Boston")).await.expect("save");
        repo.save(profile("C3", "New Visitor", "Chicago")).await.expect("save");

        let filter =
            CustomerFilter { segment: Some("Frequent Buyer".to_owned()), ..CustomerFilter::default() };
        let customers = repo.list(&filter).await.expect("list");

        let ids: Vec<_> = customers.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C1", "C2"]);
    }
}
