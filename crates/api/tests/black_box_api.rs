use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use shelfsync_core::{ProductId, TenantId};
use shelfsync_infra::{CatalogStore, InMemoryAuditSink, InMemoryCatalogStore, ReconcileConfig};
use shelfsync_inventory::CatalogProduct;

struct TestServer {
    base_url: String,
    catalog: Arc<InMemoryCatalogStore>,
    audit: Arc<InMemoryAuditSink>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let catalog = Arc::new(InMemoryCatalogStore::new());
        Self::spawn_with(catalog.clone(), catalog).await
    }

    async fn spawn_with(catalog: Arc<InMemoryCatalogStore>, store: Arc<dyn CatalogStore>) -> Self {
        // Same router as prod, in-memory catalog, ephemeral port.
        let (services, audit) =
            shelfsync_api::app::services::build_services_with_memory_audit(store, ReconcileConfig::default());
        let app = shelfsync_api::app::build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            catalog,
            audit,
            handle,
        }
    }

    fn url(&self) -> String {
        format!("{}/inventory/shelf-reconciliations", self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn seed(srv: &TestServer, tenant_id: TenantId) -> ProductId {
    let widget_a = ProductId::new();
    srv.catalog
        .insert(tenant_id, CatalogProduct::new(widget_a, "WA-DLX", "Widget A Deluxe", 10));
    srv.catalog
        .insert(tenant_id, CatalogProduct::new(ProductId::new(), "WB", "Widget B", 5));
    srv.catalog
        .insert(tenant_id, CatalogProduct::new(ProductId::new(), "WC", "Widget C", 7));
    widget_a
}

fn quantity(srv: &TestServer, tenant_id: TenantId, id: ProductId) -> i64 {
    srv.catalog
        .list(tenant_id)
        .into_iter()
        .find(|p| p.product_id == id)
        .map(|p| p.quantity)
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_header_required() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url())
        .json(&json!({ "detectedItems": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(srv.url())
        .header("x-tenant-id", "not-a-uuid")
        .json(&json!({ "detectedItems": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_tenant");
}

#[tokio::test]
async fn shelf_photo_reconciliation_end_to_end() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let widget_a = seed(&srv, tenant_id);

    let client = reqwest::Client::new();
    let res = client
        .post(srv.url())
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({
            "detectedItems": [
                { "name": "Widget A", "estimatedQuantity": 12, "confidence": 0.95 },
                { "name": "Unknown Gadget", "estimatedQuantity": 5, "confidence": 0.9 },
                { "name": "Widget B", "estimatedQuantity": 100, "confidence": 0.9 },
                { "name": "Widget C", "estimatedQuantity": 8, "confidence": 0.6 },
                { "estimatedQuantity": 3, "confidence": 0.9 }
            ],
            "context": {
                "locationHint": "Aisle 4",
                "expectedProductNames": ["Widget A", "Gizmo"]
            }
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();

    assert_eq!(body["counts"], json!({ "applied": 1, "conflicts": 3, "errors": 1 }));
    assert_eq!(body["applied"][0]["productId"], widget_a.to_string());
    assert_eq!(body["applied"][0]["oldQuantity"], 10);
    assert_eq!(body["applied"][0]["newQuantity"], 12);
    assert_eq!(body["conflicts"][0]["reason"], "Product not found in catalog");
    assert_eq!(body["conflicts"][0]["action"], "requires_human_review");
    assert_eq!(body["errors"][0]["message"], "validation failed: name is required");
    assert_eq!(body["missingExpected"], json!(["Gizmo"]));
    assert_eq!(body["needsHumanReview"], true);

    assert_eq!(quantity(&srv, tenant_id, widget_a), 12);

    let audits = srv.audit.all();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].submission_id.to_string(), body["submissionId"].as_str().unwrap());
    assert_eq!(audits[0].location_hint.as_deref(), Some("Aisle 4"));
}

#[tokio::test]
async fn malformed_item_does_not_reject_the_submission() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let widget_a = seed(&srv, tenant_id);

    let res = reqwest::Client::new()
        .post(srv.url())
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({
            "detectedItems": [
                { "name": "Widget A", "estimatedQuantity": 12, "confidence": 0.95 },
                { "name": "Widget B", "estimatedQuantity": "5", "confidence": 0.9 },
                null
            ]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["counts"], json!({ "applied": 1, "conflicts": 0, "errors": 2 }));
    assert_eq!(body["errors"][0]["itemName"], "Widget B");
    assert_eq!(
        body["errors"][0]["message"],
        "validation failed: estimatedQuantity must be a number (got a string)"
    );
    assert_eq!(quantity(&srv, tenant_id, widget_a), 12);
}

#[tokio::test]
async fn tenants_are_isolated() {
    let srv = TestServer::spawn().await;
    let owner = TenantId::new();
    let widget_a = seed(&srv, owner);

    let res = reqwest::Client::new()
        .post(srv.url())
        .header("x-tenant-id", TenantId::new().to_string())
        .json(&json!({
            "detectedItems": [{ "name": "Widget A", "estimatedQuantity": 11, "confidence": 0.99 }]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["counts"]["applied"], 0);
    assert_eq!(body["conflicts"][0]["reason"], "Product not found in catalog");
    assert_eq!(quantity(&srv, owner, widget_a), 10);
}

mod outage {
    use async_trait::async_trait;

    use shelfsync_core::ExpectedQuantity;
    use shelfsync_infra::CatalogError;

    use super::*;

    struct DownCatalog;

    #[async_trait]
    impl CatalogStore for DownCatalog {
        async fn find_by_name_contains(
            &self,
            _: TenantId,
            _: &str,
            _: usize,
        ) -> Result<Vec<CatalogProduct>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".to_string()))
        }

        async fn get(&self, _: TenantId, _: ProductId) -> Result<Option<CatalogProduct>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".to_string()))
        }

        async fn set_quantity(
            &self,
            _: TenantId,
            _: ProductId,
            _: ExpectedQuantity,
            _: i64,
        ) -> Result<(), CatalogError> {
            panic!("no write may happen during an outage");
        }
    }

    #[tokio::test]
    async fn catalog_outage_is_service_unavailable() {
        let srv = TestServer::spawn_with(Arc::new(InMemoryCatalogStore::new()), Arc::new(DownCatalog)).await;

        let res = reqwest::Client::new()
            .post(srv.url())
            .header("x-tenant-id", TenantId::new().to_string())
            .json(&json!({
                "detectedItems": [{ "name": "Widget A", "estimatedQuantity": 12, "confidence": 0.95 }]
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "catalog_unavailable");
        assert!(srv.audit.all().is_empty());
    }
}
