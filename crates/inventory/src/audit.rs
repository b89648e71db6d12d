//! Human-readable audit summary of one reconciliation run.
//!
//! Construction only. Publishing the record is the caller's concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shelfsync_core::{SubmissionId, TenantId};

use crate::outcome::ReconciliationOutcome;

/// Metadata stamped on an audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditContext {
    pub tenant_id: TenantId,
    pub submission_id: SubmissionId,
    pub location_hint: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Fixed-format report of a reconciliation run, ready for an external sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub tenant_id: TenantId,
    pub submission_id: SubmissionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_hint: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub applied_count: usize,
    pub conflict_count: usize,
    pub error_count: usize,
    pub body: String,
}

impl AuditRecord {
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.body.lines()
    }
}

/// Render the audit record for `outcome`.
///
/// Layout (one line each, in this order):
/// - header with the submission id and optional location
/// - `Applied: <name> [<product>] <old> → <new> (confidence <c>)` per applied update
/// - `Conflict: <name>: <reason>` per conflict
/// - `Error: <name>: <message>` per error
/// - `Missing: <name>` per expected product nobody detected
/// - `Summary: <a> applied, <c> conflicts, <e> errors`
pub fn summarize(outcome: &ReconciliationOutcome, ctx: &AuditContext) -> AuditRecord {
    let mut lines: Vec<String> = Vec::with_capacity(outcome.total() + 2);

    match ctx.location_hint.as_deref() {
        Some(location) => lines.push(format!(
            "Shelf reconciliation {} (location: {location})",
            ctx.submission_id
        )),
        None => lines.push(format!("Shelf reconciliation {}", ctx.submission_id)),
    }

    for a in outcome.applied() {
        lines.push(format!(
            "Applied: {} [{}] {} → {} (confidence {:.2})",
            a.item_name, a.product_id, a.old_quantity, a.new_quantity, a.confidence
        ));
    }
    for c in outcome.conflicts() {
        lines.push(format!("Conflict: {}: {}", c.item_name, c.reason));
    }
    for e in outcome.errors() {
        lines.push(format!("Error: {}: {}", e.label(), e.message));
    }
    for name in outcome.missing_expected() {
        lines.push(format!("Missing: {name}"));
    }

    lines.push(format!(
        "Summary: {} applied, {} conflicts, {} errors",
        outcome.applied().len(),
        outcome.conflicts().len(),
        outcome.errors().len()
    ));

    AuditRecord {
        tenant_id: ctx.tenant_id,
        submission_id: ctx.submission_id,
        location_hint: ctx.location_hint.clone(),
        occurred_at: ctx.occurred_at,
        applied_count: outcome.applied().len(),
        conflict_count: outcome.conflicts().len(),
        error_count: outcome.errors().len(),
        body: lines.join("\n"),
    }
}
