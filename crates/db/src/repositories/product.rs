use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use smartshop_core::domain::analytics::PricePoint;
use smartshop_core::domain::context::Season;
use smartshop_core::domain::product::{ProductId, ProductRecord};
use smartshop_core::gateway::ProductFilter;

use super::customer::{decode_json, encode_json};
use super::{average_by_period, ProductRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = r#"
    id,
    category,
    subcategory,
    brand,
    CAST(price AS TEXT) AS price_text,
    rating,
    avg_similar_rating,
    sentiment_score,
    seasons_json,
    occasions_json
"#;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<ProductRecord>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn list(&self, filter: &ProductFilter) -> Result<Vec<ProductRecord>, RepositoryError> {
        let limit = filter.limit.map(|limit| limit as i64).unwrap_or(-1);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE (? IS NULL OR category = ? COLLATE NOCASE)
              AND (? IS NULL OR category <> ? COLLATE NOCASE)
            ORDER BY id
            LIMIT ?
            "#
        ))
        .bind(filter.category.as_deref())
        .bind(filter.category.as_deref())
        .bind(filter.exclude_category.as_deref())
        .bind(filter.exclude_category.as_deref())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(product_from_row).collect()
    }

    async fn save(&self, product: ProductRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, category, subcategory, brand, price, rating,
                avg_similar_rating, sentiment_score, seasons_json, occasions_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                category = excluded.category,
                subcategory = excluded.subcategory,
                brand = excluded.brand,
                price = excluded.price,
                rating = excluded.rating,
                avg_similar_rating = excluded.avg_similar_rating,
                sentiment_score = excluded.sentiment_score,
                seasons_json = excluded.seasons_json,
                occasions_json = excluded.occasions_json
            "#,
        )
        .bind(&product.id.0)
        .bind(&product.category)
        .bind(&product.subcategory)
        .bind(&product.brand)
        .bind(product.price.to_string())
        .bind(product.rating)
        .bind(product.avg_similar_rating)
        .bind(product.sentiment_score)
        .bind(encode_json(&product.seasons)?)
        .bind(encode_json(&product.occasions)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_price(
        &self,
        product_id: &ProductId,
        period: &str,
        price: Decimal,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO price_history (product_id, period, price) VALUES (?, ?, ?)
            ON CONFLICT(product_id, period) DO UPDATE SET price = excluded.price
            "#,
        )
        .bind(&product_id.0)
        .bind(period)
        .bind(price.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn price_history(&self, category: &str) -> Result<Vec<PricePoint>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT h.period AS period, CAST(h.price AS TEXT) AS price_text
            FROM price_history h
            JOIN products p ON p.id = h.product_id
            WHERE p.category = ? COLLATE NOCASE
            ORDER BY h.period
            "#,
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        let mut points = Vec::with_capacity(rows.len());
        for row in &rows {
            let period: String = row.try_get("period")?;
            let price = parse_decimal(&row.try_get::<String, _>("price_text")?, &period)?;
            points.push((period, price));
        }
        Ok(average_by_period(points))
    }
}

fn product_from_row(row: &SqliteRow) -> Result<ProductRecord, RepositoryError> {
    let id: String = row.try_get("id")?;
    let price = parse_decimal(&row.try_get::<String, _>("price_text")?, &id)?;
    let seasons: Vec<Season> = decode_json(&row.try_get::<String, _>("seasons_json")?, &id)?;
    let occasions: Vec<String> = decode_json(&row.try_get::<String, _>("occasions_json")?, &id)?;

    Ok(ProductRecord {
        category: row.try_get("category")?,
        subcategory: row.try_get("subcategory")?,
        brand: row.try_get("brand")?,
        price,
        rating: row.try_get("rating")?,
        avg_similar_rating: row.try_get("avg_similar_rating")?,
        sentiment_score: row.try_get("sentiment_score")?,
        seasons,
        occasions,
        id: ProductId(id),
    })
}

fn parse_decimal(raw: &str, owner: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw.trim())
        .map_err(|error| RepositoryError::Decode(format!("record `{owner}` price `{raw}`: {error}")))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use smartshop_core::domain::context::Season;
    use smartshop_core::domain::product::{ProductId, ProductRecord};
    use smartshop_core::gateway::ProductFilter;

    use super::SqlProductRepository;
    use crate::repositories::ProductRepository;
    use crate::{connect_with_settings, migrations};

    fn product(id: &str, category: &str, price: Decimal) -> ProductRecord {
        ProductRecord {
            id: ProductId::from(id),
            category: category.to_owned(),
            subcategory: "Jackets".to_owned(),
            brand: "FashionCo".to_owned(),
            price,
            rating: 4.1,
            avg_similar_rating: 4.2,
            sentiment_score: 0.75,
            seasons: vec![Season::Winter, Season::Fall],
            occasions: vec!["Holiday".to_owned()],
        }
    }

    async fn repository() -> SqlProductRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlProductRepository::new(pool)
    }

    #[tokio::test]
    async fn save_and_find_round_trip() {
        let repo = repository().await;
        let record = product("P2001", "Fashion", Decimal::new(8999, 2));

        repo.save(record.clone()).await.expect("save product");
        let found = repo.find_by_id(&record.id).await.expect("find product");

        assert_eq!(found, Some(record));
    }

    #[tokio::test]
    async fn list_applies_category_filters() {
        let repo = repository().await;
        repo.save(product("P2", "Fashion", Decimal::from(10))).await.expect("save");
        repo.save(product("P1", "fashion", Decimal::from(20))).await.expect("save");
        repo.save(product("P3", "Books", Decimal::from(30))).await.expect("save");

        let fashion = repo.list(&ProductFilter::category("Fashion")).await.expect("list");
        let ids: Vec<_> = fashion.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "P2"]);

        let others = repo
            .list(&ProductFilter {
                exclude_category: Some("FASHION".to_owned()),
                ..ProductFilter::default()
            })
            .await
            .expect("list");
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].id, ProductId::from("P3"));
    }

    #[tokio::test]
    async fn price_history_averages_per_period() {
        let repo = repository().await;
        repo.save(product("P1", "Fashion", Decimal::from(10))).await.expect("save");
        repo.save(product("P2", "Fashion", Decimal::from(20))).await.expect("save");
        repo.record_price(&ProductId::from("P1"), "2024-01", Decimal::from(10)).await.expect("price");
        repo.record_price(&ProductId::from("P2"), "2024-01", Decimal::from(30)).await.expect("price");
        repo.record_price(&ProductId::from("P1"), "2024-02", Decimal::from(12)).await.expect("price");

        let history = repo.price_history("fashion").await.expect("history");

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].period, "2024-01");
        assert_eq!(history[0].average_price, Decimal::from(20));
        assert_eq!(history[1].average_price, Decimal::from(12));
    }
}
