//! Infrastructure layer: catalog adapters, the reconciliation pipeline and audit sinks.

pub mod audit;
pub mod catalog;
pub mod config;
pub mod matcher;
pub mod mutator;
pub mod reconciler;

mod timeouts;

pub use audit::{AuditEmitter, AuditSink, AuditSinkError, InMemoryAuditSink, TracingAuditSink};
pub use catalog::{CatalogError, CatalogStore, InMemoryCatalogStore};
pub use config::{ConfigError, ReconcileConfig};
pub use matcher::{CatalogMatcher, MatchError};
pub use mutator::{InventoryMutator, MutationError};
pub use reconciler::{
    ReconcileError, Reconciliation, Reconciler, ShelfSubmission, SubmissionContext,
};

#[cfg(feature = "postgres")]
pub use catalog::PostgresCatalogStore;
