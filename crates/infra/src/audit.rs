//! Audit sinks for reconciliation summaries.
//!
//! Audit publication is best-effort: a sink failure is logged and swallowed and
//! never rolls back an inventory write that already happened.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{info, warn};

use shelfsync_inventory::{summarize, AuditContext, AuditRecord, ReconciliationOutcome};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditSinkError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for audit records (message store, activity log, ...).
pub trait AuditSink: Send + Sync + 'static {
    fn publish(&self, record: &AuditRecord) -> Result<(), AuditSinkError>;
}

impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    fn publish(&self, record: &AuditRecord) -> Result<(), AuditSinkError> {
        (**self).publish(record)
    }
}

/// Publish to both sinks; fails if either fails, after trying both.
impl<A, B> AuditSink for (A, B)
where
    A: AuditSink,
    B: AuditSink,
{
    fn publish(&self, record: &AuditRecord) -> Result<(), AuditSinkError> {
        let first = self.0.publish(record);
        let second = self.1.publish(record);
        first.and(second)
    }
}

/// In-memory sink for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    inner: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<AuditRecord> {
        self.inner.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn publish(&self, record: &AuditRecord) -> Result<(), AuditSinkError> {
        self.inner
            .lock()
            .map_err(|_| AuditSinkError::Unavailable("lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}

/// Writes audit records to the structured log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn publish(&self, record: &AuditRecord) -> Result<(), AuditSinkError> {
        info!(
            target: "shelfsync::audit",
            tenant = %record.tenant_id,
            submission = %record.submission_id,
            applied = record.applied_count,
            conflicts = record.conflict_count,
            errors = record.error_count,
            body = %record.body,
            "shelf reconciliation audit"
        );
        Ok(())
    }
}

/// Builds audit records and hands them to a sink.
#[derive(Debug, Clone)]
pub struct AuditEmitter<S> {
    sink: S,
}

impl<S> AuditEmitter<S>
where
    S: AuditSink,
{
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Summarize `outcome`, publish it, and return the record.
    ///
    /// Publish failures are logged; the record is returned either way.
    pub fn emit(&self, outcome: &ReconciliationOutcome, ctx: &AuditContext) -> AuditRecord {
        let record = summarize(outcome, ctx);
        if let Err(e) = self.sink.publish(&record) {
            warn!(
                tenant = %record.tenant_id,
                submission = %record.submission_id,
                error = %e,
                "failed to publish reconciliation audit record"
            );
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use shelfsync_core::{SubmissionId, TenantId};
    use shelfsync_inventory::{Conflict, ItemOutcome};

    use super::*;

    struct DownSink;

    impl AuditSink for DownSink {
        fn publish(&self, _record: &AuditRecord) -> Result<(), AuditSinkError> {
            Err(AuditSinkError::Unavailable("connection refused".to_string()))
        }
    }

    fn ctx() -> AuditContext {
        AuditContext {
            tenant_id: TenantId::new(),
            submission_id: SubmissionId::new(),
            location_hint: None,
            occurred_at: Utc::now(),
        }
    }

    fn outcome() -> ReconciliationOutcome {
        ReconciliationOutcome::from_items(vec![ItemOutcome::Conflict(Conflict::new(
            "Unknown Gadget",
            None,
            "Product not found in catalog",
        ))])
    }

    #[test]
    fn emit_publishes_to_sink() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let emitter = AuditEmitter::new(sink.clone());
        let record = emitter.emit(&outcome(), &ctx());

        let stored = sink.all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], record);
        assert_eq!(record.conflict_count, 1);
    }

    #[test]
    fn sink_failure_is_swallowed() {
        let emitter = AuditEmitter::new(DownSink);
        let record = emitter.emit(&outcome(), &ctx());
        assert!(record.body.contains("Conflict: Unknown Gadget"));
    }

    #[test]
    fn pair_sink_tries_both_even_if_first_fails() {
        let memory = Arc::new(InMemoryAuditSink::new());
        let pair = (DownSink, memory.clone());
        let record = summarize(&outcome(), &ctx());
        assert!(pair.publish(&record).is_err());
        assert_eq!(memory.all().len(), 1);
    }
}
