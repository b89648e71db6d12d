//! Postgres-backed catalog store.
//!
//! Maps to the `catalog_products` table:
//!
//! ```sql
//! CREATE TABLE catalog_products (
//!     tenant_id      UUID        NOT NULL,
//!     product_id     UUID        NOT NULL,
//!     sku            TEXT        NOT NULL,
//!     title          TEXT        NOT NULL,
//!     tags           TEXT[]      NOT NULL DEFAULT '{}',
//!     quantity       BIGINT      NOT NULL DEFAULT 0,
//!     track_quantity BOOLEAN     NOT NULL DEFAULT FALSE,
//!     created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (tenant_id, product_id)
//! );
//! ```
//!
//! ## Tenant Isolation
//!
//! Every query includes `tenant_id` in the WHERE clause.
//!
//! ## Conditional Writes
//!
//! `set_quantity` with `ExpectedQuantity::Exact` is a single
//! `UPDATE ... WHERE quantity = $expected`; zero affected rows means either the
//! product is gone or its quantity moved, and a follow-up read tells which.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;

use shelfsync_core::{ExpectedQuantity, ProductId, TenantId};
use shelfsync_inventory::CatalogProduct;

use super::{CatalogError, CatalogStore};

pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a small default pool.
    pub async fn connect(database_url: &str) -> Result<Self, CatalogError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(map_sqlx)?;
        Ok(Self::new(pool))
    }
}

fn map_sqlx(err: sqlx::Error) -> CatalogError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            CatalogError::Unavailable(err.to_string())
        }
        other => CatalogError::Storage(other.to_string()),
    }
}

/// Escape LIKE metacharacters so detected names are matched literally.
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for ch in text.trim().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn row_to_product(row: &sqlx::postgres::PgRow) -> Result<CatalogProduct, CatalogError> {
    let product_id: uuid::Uuid = row.try_get("product_id").map_err(map_sqlx)?;
    Ok(CatalogProduct {
        product_id: ProductId::from_uuid(product_id),
        sku: row.try_get("sku").map_err(map_sqlx)?,
        title: row.try_get("title").map_err(map_sqlx)?,
        tags: row.try_get("tags").map_err(map_sqlx)?,
        quantity: row.try_get("quantity").map_err(map_sqlx)?,
        track_quantity: row.try_get("track_quantity").map_err(map_sqlx)?,
    })
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn find_by_name_contains(
        &self,
        tenant_id: TenantId,
        text: &str,
        limit: usize,
    ) -> Result<Vec<CatalogProduct>, CatalogError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT product_id, sku, title, tags, quantity, track_quantity
            FROM catalog_products
            WHERE tenant_id = $1
              AND (
                    title ILIKE $2
                 OR sku ILIKE $2
                 OR EXISTS (SELECT 1 FROM unnest(tags) AS t(tag) WHERE t.tag ILIKE $2)
              )
            ORDER BY created_at, product_id
            LIMIT $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(like_pattern(text))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter().map(row_to_product).collect()
    }

    async fn get(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<CatalogProduct>, CatalogError> {
        let row = sqlx::query(
            r#"
            SELECT product_id, sku, title, tags, quantity, track_quantity
            FROM catalog_products
            WHERE tenant_id = $1 AND product_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn set_quantity(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        expected: ExpectedQuantity,
        quantity: i64,
    ) -> Result<(), CatalogError> {
        let result = match expected {
            ExpectedQuantity::Any => {
                sqlx::query(
                    r#"
                    UPDATE catalog_products
                    SET quantity = $3, track_quantity = TRUE, updated_at = NOW()
                    WHERE tenant_id = $1 AND product_id = $2
                    "#,
                )
                .bind(tenant_id.as_uuid())
                .bind(product_id.as_uuid())
                .bind(quantity)
                .execute(&self.pool)
                .await
            }
            ExpectedQuantity::Exact(baseline) => {
                sqlx::query(
                    r#"
                    UPDATE catalog_products
                    SET quantity = $3, track_quantity = TRUE, updated_at = NOW()
                    WHERE tenant_id = $1 AND product_id = $2 AND quantity = $4
                    "#,
                )
                .bind(tenant_id.as_uuid())
                .bind(product_id.as_uuid())
                .bind(quantity)
                .bind(baseline)
                .execute(&self.pool)
                .await
            }
        }
        .map_err(map_sqlx)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        debug!(tenant = %tenant_id, product = %product_id, "conditional quantity write matched no rows");
        let current = self
            .get(tenant_id, product_id)
            .await?
            .ok_or(CatalogError::NotFound(product_id))?;
        expected.check(current.quantity)?;
        // Row exists and the baseline still holds; the row moved and moved back.
        Err(CatalogError::Storage("quantity update affected no rows".to_string()))
    }
}
