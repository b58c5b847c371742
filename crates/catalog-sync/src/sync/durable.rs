//! Durable upsert sink backed by PostgreSQL

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use super::model::Product;
use crate::db::{self, DbResult};
use crate::error::DurableError;

/// Insert-or-update keyed by `id`
///
/// Re-applying an identical product leaves the row unchanged apart from
/// `updated_at`. Concurrent writers for one id resolve last-writer-wins.
pub const UPSERT_PRODUCT_SQL: &str = r#"
    INSERT INTO products (id, name, image, price, quantity, updated_at)
    VALUES ($1, $2, $3, $4, $5, NOW())
    ON CONFLICT (id) DO UPDATE SET
        name = EXCLUDED.name,
        image = EXCLUDED.image,
        price = EXCLUDED.price,
        quantity = EXCLUDED.quantity,
        updated_at = NOW()
"#;

/// Authoritative store of products
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Idempotently write one product
    async fn upsert(&self, product: &Product) -> Result<(), DurableError>;
}

/// [`ProductStore`] issuing one parameterized statement per product
#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> DbResult<()> {
        db::health_check(&self.pool).await
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    async fn upsert(&self, product: &Product) -> Result<(), DurableError> {
        sqlx::query(UPSERT_PRODUCT_SQL)
            .bind(&product.id)
            .bind(&product.name)
            .bind(&product.image)
            .bind(product.price)
            .bind(product.quantity)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
