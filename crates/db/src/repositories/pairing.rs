use async_trait::async_trait;
use sqlx::Row;

use smartshop_core::domain::analytics::CategoryPairing;

use super::{PairingRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPairingRepository {
    pool: DbPool,
}

impl SqlPairingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PairingRepository for SqlPairingRepository {
    async fn list_for_category(
        &self,
        category: &str,
    ) -> Result<Vec<CategoryPairing>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT category, paired_category, co_occurrence_count
            FROM category_pairings
            WHERE category = ? COLLATE NOCASE
            ORDER BY co_occurrence_count DESC, paired_category
            "#,
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<CategoryPairing, RepositoryError> {
                let count: i64 = row.try_get("co_occurrence_count")?;
                Ok(CategoryPairing {
                    category: row.try_get("category")?,
                    paired_category: row.try_get("paired_category")?,
                    co_occurrence_count: u32::try_from(count).map_err(|_| {
                        RepositoryError::Decode(format!("invalid co-occurrence count {count}"))
                    })?,
                })
            })
            .collect()
    }

    async fn save(&self, pairing: CategoryPairing) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO category_pairings (category, paired_category, co_occurrence_count)
            VALUES (?, ?, ?)
            ON CONFLICT(category, paired_category)
            DO UPDATE SET co_occurrence_count = excluded.co_occurrence_count
            "#,
        )
        .bind(&pairing.category)
        .bind(&pairing.paired_category)
        .bind(i64::from(pairing.co_occurrence_count))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
