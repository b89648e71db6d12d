//! Catalog store seam.
//!
//! The catalog is owned by the CMS; the pipeline only searches it and writes
//! absolute quantities back. Every write carries the baseline it was decided
//! on so a concurrent update is detected instead of overwritten.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use shelfsync_core::{ExpectedQuantity, ProductId, QuantityMismatch, TenantId};
use shelfsync_inventory::CatalogProduct;

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryCatalogStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresCatalogStore;

/// Catalog store operation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The store could not be reached (connection refused, pool exhausted, ...).
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("product {0} not found in catalog")]
    NotFound(ProductId),

    /// Conditional write rejected: the stored quantity moved since it was read.
    #[error("quantity changed concurrently (expected {expected}, found {actual})")]
    Concurrency { expected: i64, actual: i64 },

    #[error("catalog storage error: {0}")]
    Storage(String),
}

impl From<QuantityMismatch> for CatalogError {
    fn from(m: QuantityMismatch) -> Self {
        Self::Concurrency {
            expected: m.expected,
            actual: m.actual,
        }
    }
}

/// Tenant-scoped catalog access used by the matcher and the mutator.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Products whose title, SKU or tags contain `text` (case-insensitive),
    /// in the catalog's default ordering, at most `limit` of them.
    async fn find_by_name_contains(
        &self,
        tenant_id: TenantId,
        text: &str,
        limit: usize,
    ) -> Result<Vec<CatalogProduct>, CatalogError>;

    async fn get(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<CatalogProduct>, CatalogError>;

    /// Set the absolute quantity and flag the product as quantity-tracked.
    ///
    /// Implementations must check `expected` and write atomically.
    async fn set_quantity(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        expected: ExpectedQuantity,
        quantity: i64,
    ) -> Result<(), CatalogError>;
}

#[async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn find_by_name_contains(
        &self,
        tenant_id: TenantId,
        text: &str,
        limit: usize,
    ) -> Result<Vec<CatalogProduct>, CatalogError> {
        (**self).find_by_name_contains(tenant_id, text, limit).await
    }

    async fn get(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<CatalogProduct>, CatalogError> {
        (**self).get(tenant_id, product_id).await
    }

    async fn set_quantity(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        expected: ExpectedQuantity,
        quantity: i64,
    ) -> Result<(), CatalogError> {
        (**self).set_quantity(tenant_id, product_id, expected, quantity).await
    }
}
