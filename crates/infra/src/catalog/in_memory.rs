use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use shelfsync_core::{ExpectedQuantity, ProductId, TenantId};
use shelfsync_inventory::CatalogProduct;

use super::{CatalogError, CatalogStore};

/// In-memory, tenant-isolated catalog.
///
/// Intended for tests/dev. Default ordering is insertion order.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    products: RwLock<HashMap<TenantId, Vec<CatalogProduct>>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product (keyed by product id) for a tenant.
    pub fn insert(&self, tenant_id: TenantId, product: CatalogProduct) {
        let mut products = self.products.write().unwrap_or_else(|e| e.into_inner());
        let tenant = products.entry(tenant_id).or_default();
        match tenant.iter_mut().find(|p| p.product_id == product.product_id) {
            Some(existing) => *existing = product,
            None => tenant.push(product),
        }
    }

    /// Snapshot of a tenant's catalog in default ordering.
    pub fn list(&self, tenant_id: TenantId) -> Vec<CatalogProduct> {
        self.products
            .read()
            .map(|p| p.get(&tenant_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn find_by_name_contains(
        &self,
        tenant_id: TenantId,
        text: &str,
        limit: usize,
    ) -> Result<Vec<CatalogProduct>, CatalogError> {
        let products = self
            .products
            .read()
            .map_err(|_| CatalogError::Storage("lock poisoned".to_string()))?;

        Ok(products
            .get(&tenant_id)
            .map(|all| {
                all.iter()
                    .filter(|p| p.contains_text(text))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<CatalogProduct>, CatalogError> {
        let products = self
            .products
            .read()
            .map_err(|_| CatalogError::Storage("lock poisoned".to_string()))?;

        Ok(products
            .get(&tenant_id)
            .and_then(|all| all.iter().find(|p| p.product_id == product_id).cloned()))
    }

    async fn set_quantity(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        expected: ExpectedQuantity,
        quantity: i64,
    ) -> Result<(), CatalogError> {
        let mut products = self
            .products
            .write()
            .map_err(|_| CatalogError::Storage("lock poisoned".to_string()))?;

        let product = products
            .get_mut(&tenant_id)
            .and_then(|all| all.iter_mut().find(|p| p.product_id == product_id))
            .ok_or(CatalogError::NotFound(product_id))?;

        expected.check(product.quantity)?;

        product.quantity = quantity;
        product.track_quantity = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (InMemoryCatalogStore, TenantId, ProductId) {
        let store = InMemoryCatalogStore::new();
        let tenant = TenantId::new();
        let id = ProductId::new();
        store.insert(tenant, CatalogProduct::new(id, "WID-A", "Widget A Deluxe", 10));
        store.insert(tenant, CatalogProduct::new(ProductId::new(), "WID-B", "Widget B", 5));
        store.insert(tenant, CatalogProduct::new(ProductId::new(), "GIZ", "Gizmo", 1).with_tags(["widget accessory"]));
        (store, tenant, id)
    }

    #[tokio::test]
    async fn search_is_case_insensitive_ordered_and_capped() {
        let (store, tenant, id) = seeded();
        let hits = store.find_by_name_contains(tenant, "WIDGET", 5).await.unwrap();
        let titles: Vec<_> = hits.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Widget A Deluxe", "Widget B", "Gizmo"]);
        assert_eq!(hits[0].product_id, id);

        let capped = store.find_by_name_contains(tenant, "widget", 2).await.unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[tokio::test]
    async fn search_is_tenant_isolated() {
        let (store, _tenant, _) = seeded();
        let other = TenantId::new();
        assert!(store.find_by_name_contains(other, "widget", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_quantity_is_absolute_and_tracks() {
        let (store, tenant, id) = seeded();
        store.set_quantity(tenant, id, ExpectedQuantity::Exact(10), 12).await.unwrap();
        let p = store.get(tenant, id).await.unwrap().unwrap();
        assert_eq!(p.quantity, 12);
        assert!(p.track_quantity);
    }

    #[tokio::test]
    async fn set_quantity_rejects_stale_baseline() {
        let (store, tenant, id) = seeded();
        store.set_quantity(tenant, id, ExpectedQuantity::Any, 7).await.unwrap();
        let err = store.set_quantity(tenant, id, ExpectedQuantity::Exact(10), 12).await.unwrap_err();
        assert_eq!(err, CatalogError::Concurrency { expected: 10, actual: 7 });
        assert_eq!(store.get(tenant, id).await.unwrap().unwrap().quantity, 7);
    }

    #[tokio::test]
    async fn set_quantity_on_unknown_product_is_not_found() {
        let (store, tenant, _) = seeded();
        let missing = ProductId::new();
        let err = store.set_quantity(tenant, missing, ExpectedQuantity::Any, 1).await.unwrap_err();
        assert_eq!(err, CatalogError::NotFound(missing));
    }
}
