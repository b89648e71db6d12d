use std::sync::Arc;

use shelfsync_infra::{
    AuditSink, CatalogStore, InMemoryAuditSink, ReconcileConfig, Reconciler, TracingAuditSink,
};

pub type ApiReconciler = Reconciler<Arc<dyn CatalogStore>, Arc<dyn AuditSink>>;

/// Shared handler state.
pub struct AppServices {
    pub reconciler: Arc<ApiReconciler>,
    pub review_confidence_floor: f64,
}

/// Production wiring: audit records go to the structured log.
pub fn build_services(catalog: Arc<dyn CatalogStore>, config: ReconcileConfig) -> AppServices {
    build_services_with_sink(catalog, Arc::new(TracingAuditSink), config)
}

/// Wiring with an explicit audit sink.
pub fn build_services_with_sink(
    catalog: Arc<dyn CatalogStore>,
    sink: Arc<dyn AuditSink>,
    config: ReconcileConfig,
) -> AppServices {
    AppServices {
        reconciler: Arc::new(Reconciler::new(catalog, sink, &config)),
        review_confidence_floor: config.review_confidence_floor,
    }
}

/// Log audit records and keep a copy in memory (tests/dev).
pub fn build_services_with_memory_audit(
    catalog: Arc<dyn CatalogStore>,
    config: ReconcileConfig,
) -> (AppServices, Arc<InMemoryAuditSink>) {
    let memory = Arc::new(InMemoryAuditSink::new());
    let sink: Arc<dyn AuditSink> = Arc::new((TracingAuditSink, memory.clone()));
    (build_services_with_sink(catalog, sink, config), memory)
}
