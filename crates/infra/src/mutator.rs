//! Inventory mutator: the only writer of catalog quantities.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{info, warn};

use shelfsync_core::{ExpectedQuantity, ProductId, TenantId};

use crate::catalog::{CatalogError, CatalogStore};
use crate::timeouts::call_budget;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("catalog write timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("submission deadline exceeded before catalog write completed")]
    DeadlineExceeded,

    /// The quantity moved between match and write.
    #[error("quantity changed concurrently (expected {expected}, found {actual})")]
    Conflict { expected: i64, actual: i64 },

    #[error("product {0} not found in catalog")]
    NotFound(ProductId),

    #[error("catalog write failed: {0}")]
    Storage(String),
}

impl From<CatalogError> for MutationError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Concurrency { expected, actual } => Self::Conflict { expected, actual },
            CatalogError::NotFound(id) => Self::NotFound(id),
            CatalogError::Unavailable(msg) | CatalogError::Storage(msg) => Self::Storage(msg),
        }
    }
}

type LockKey = (TenantId, ProductId);

/// Per-product async locks so in-process writers to one product never interleave.
///
/// Entries are counted by lease; the last lease to drop removes the entry.
#[derive(Debug, Default)]
struct ProductLocks {
    inflight: std::sync::Mutex<HashMap<LockKey, LockSlot>>,
}

#[derive(Debug)]
struct LockSlot {
    lock: Arc<Mutex<()>>,
    leases: usize,
}

impl ProductLocks {
    fn lease(&self, key: LockKey) -> LockLease<'_> {
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        let slot = inflight.entry(key).or_insert_with(|| LockSlot {
            lock: Arc::new(Mutex::new(())),
            leases: 0,
        });
        slot.leases += 1;
        LockLease {
            locks: self,
            key,
            lock: Arc::clone(&slot.lock),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inflight.lock().map(|m| m.len()).unwrap_or_default()
    }
}

/// Interest in one product's lock; the map entry goes away with the last lease.
struct LockLease<'a> {
    locks: &'a ProductLocks,
    key: LockKey,
    lock: Arc<Mutex<()>>,
}

impl LockLease<'_> {
    async fn acquire(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.lock).lock_owned().await
    }
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        let mut inflight = self.locks.inflight.lock().unwrap_or_else(|e| e.into_inner());
        let idle = match inflight.get_mut(&self.key) {
            Some(slot) => {
                slot.leases = slot.leases.saturating_sub(1);
                slot.leases == 0
            }
            None => false,
        };
        if idle {
            inflight.remove(&self.key);
        }
    }
}

/// Persists accepted quantity decisions, one product at a time.
///
/// Writes are absolute sets conditioned on the baseline the decision was made
/// against; a moved baseline comes back as [`MutationError::Conflict`].
#[derive(Debug)]
pub struct InventoryMutator<C> {
    catalog: C,
    write_timeout: Duration,
    locks: ProductLocks,
}

impl<C> InventoryMutator<C>
where
    C: CatalogStore,
{
    pub fn new(catalog: C, write_timeout: Duration) -> Self {
        Self {
            catalog,
            write_timeout,
            locks: ProductLocks::default(),
        }
    }

    /// Set `product_id`'s quantity to `new_quantity`.
    ///
    /// The timeout covers waiting for the product lock as well as the write.
    pub async fn apply(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        expected: ExpectedQuantity,
        new_quantity: i64,
        deadline: Option<Instant>,
    ) -> Result<(), MutationError> {
        let budget = call_budget(self.write_timeout, deadline).ok_or(MutationError::DeadlineExceeded)?;
        let key = (tenant_id, product_id);

        let write = async {
            let lease = self.locks.lease(key);
            let _guard = lease.acquire().await;
            self.catalog
                .set_quantity(tenant_id, product_id, expected, new_quantity)
                .await
        };

        let result = tokio::time::timeout(budget.duration, write).await;

        match result {
            Ok(Ok(())) => {
                info!(
                    tenant = %tenant_id,
                    product = %product_id,
                    quantity = new_quantity,
                    "inventory quantity updated"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(tenant = %tenant_id, product = %product_id, error = %e, "inventory quantity write failed");
                Err(e.into())
            }
            Err(_) => {
                warn!(
                    tenant = %tenant_id,
                    product = %product_id,
                    timeout_ms = budget.duration.as_millis() as u64,
                    "inventory quantity write timed out"
                );
                if budget.clipped {
                    Err(MutationError::DeadlineExceeded)
                } else {
                    Err(MutationError::Timeout(budget.duration))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use shelfsync_inventory::CatalogProduct;

    use super::*;
    use crate::catalog::InMemoryCatalogStore;

    /// Catalog whose writes hang.
    struct StalledWrites;

    #[async_trait]
    impl CatalogStore for StalledWrites {
        async fn find_by_name_contains(
            &self,
            _: TenantId,
            _: &str,
            _: usize,
        ) -> Result<Vec<CatalogProduct>, CatalogError> {
            Ok(Vec::new())
        }

        async fn get(&self, _: TenantId, _: ProductId) -> Result<Option<CatalogProduct>, CatalogError> {
            Ok(None)
        }

        async fn set_quantity(
            &self,
            _: TenantId,
            _: ProductId,
            _: ExpectedQuantity,
            _: i64,
        ) -> Result<(), CatalogError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn seeded() -> (Arc<InMemoryCatalogStore>, TenantId, ProductId) {
        let store = Arc::new(InMemoryCatalogStore::new());
        let tenant = TenantId::new();
        let id = ProductId::new();
        store.insert(tenant, CatalogProduct::new(id, "WID-A", "Widget A", 10));
        (store, tenant, id)
    }

    #[tokio::test]
    async fn applies_absolute_quantity() {
        let (store, tenant, id) = seeded();
        let mutator = InventoryMutator::new(store.clone(), Duration::from_secs(1));
        mutator.apply(tenant, id, ExpectedQuantity::Exact(10), 12, None).await.unwrap();

        let p = store.get(tenant, id).await.unwrap().unwrap();
        assert_eq!(p.quantity, 12);
        assert!(p.track_quantity);
        assert_eq!(mutator.locks.len(), 0);
    }

    #[tokio::test]
    async fn stale_baseline_is_a_conflict() {
        let (store, tenant, id) = seeded();
        let mutator = InventoryMutator::new(store.clone(), Duration::from_secs(1));
        mutator.apply(tenant, id, ExpectedQuantity::Exact(10), 12, None).await.unwrap();

        let err = mutator
            .apply(tenant, id, ExpectedQuantity::Exact(10), 15, None)
            .await
            .unwrap_err();
        assert_eq!(err, MutationError::Conflict { expected: 10, actual: 12 });
        assert_eq!(store.get(tenant, id).await.unwrap().unwrap().quantity, 12);
    }

    #[tokio::test]
    async fn concurrent_writers_on_same_baseline_only_one_wins() {
        let (store, tenant, id) = seeded();
        let mutator = Arc::new(InventoryMutator::new(store.clone(), Duration::from_secs(1)));

        let a = {
            let m = mutator.clone();
            tokio::spawn(async move { m.apply(tenant, id, ExpectedQuantity::Exact(10), 11, None).await })
        };
        let b = {
            let m = mutator.clone();
            tokio::spawn(async move { m.apply(tenant, id, ExpectedQuantity::Exact(10), 14, None).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(MutationError::Conflict { expected: 10, .. }))));
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let (store, tenant, _) = seeded();
        let mutator = InventoryMutator::new(store, Duration::from_secs(1));
        let missing = ProductId::new();
        let err = mutator.apply(tenant, missing, ExpectedQuantity::Any, 1, None).await.unwrap_err();
        assert_eq!(err, MutationError::NotFound(missing));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_write_times_out() {
        let mutator = InventoryMutator::new(StalledWrites, Duration::from_millis(300));
        let err = mutator
            .apply(TenantId::new(), ProductId::new(), ExpectedQuantity::Any, 1, None)
            .await
            .unwrap_err();
        assert_eq!(err, MutationError::Timeout(Duration::from_millis(300)));
        assert_eq!(err.to_string(), "catalog write timed out after 300ms");
        assert_eq!(mutator.locks.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_writers_leave_no_lock_entries() {
        let mutator = InventoryMutator::new(StalledWrites, Duration::from_secs(3600));
        let (tenant, id) = (TenantId::new(), ProductId::new());

        // One caller holds the product lock, the other waits on it; both are dropped.
        let holder = mutator.apply(tenant, id, ExpectedQuantity::Any, 1, None);
        let waiter = mutator.apply(tenant, id, ExpectedQuantity::Any, 2, None);
        let cancelled =
            tokio::time::timeout(Duration::from_millis(100), futures::future::join(holder, waiter)).await;

        assert!(cancelled.is_err());
        assert_eq!(mutator.locks.len(), 0);
    }
}
