//! Reconciliation orchestrator.
//!
//! One call per shelf-photo submission:
//!
//! ```text
//! raw detections → normalize → match (concurrent) → decide → mutate (Apply only)
//!                                                            ↘ conflicts (Escalate)
//! ```
//!
//! Every submitted detection ends up in exactly one of applied / conflicts /
//! errors, in submission order. Matching finishes for the whole batch before
//! the first write, so a catalog outage detected during matching aborts the
//! submission without having touched inventory.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use shelfsync_core::{ExpectedQuantity, SubmissionId, TenantId};
use shelfsync_inventory::{
    missing_expected, AppliedUpdate, AuditContext, AuditRecord, Conflict, Decision, DecisionPolicy,
    ItemError, ItemOutcome, MatchedItem, ReconciliationOutcome, NOT_FOUND_REASON,
};
use shelfsync_vision::{normalize, DetectedItem, RawDetection};

use crate::audit::{AuditEmitter, AuditSink};
use crate::catalog::CatalogStore;
use crate::config::ReconcileConfig;
use crate::matcher::{CatalogMatcher, MatchError};
use crate::mutator::{InventoryMutator, MutationError};

/// Optional hints sent along with a shelf photo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionContext {
    #[serde(default)]
    pub location_hint: Option<String>,
    #[serde(default)]
    pub expected_product_names: Vec<String>,
}

/// One shelf-photo submission as produced by the vision collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelfSubmission {
    pub detected_items: Vec<RawDetection>,
    #[serde(default)]
    pub context: SubmissionContext,
}

impl ShelfSubmission {
    pub fn new(detected_items: Vec<RawDetection>) -> Self {
        Self {
            detected_items,
            context: SubmissionContext::default(),
        }
    }

    pub fn with_context(mut self, context: SubmissionContext) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// Every catalog lookup in the submission failed; nothing could be matched.
    #[error("catalog unavailable: all {attempted} lookup(s) failed (last error: {last_error})")]
    CatalogUnavailable { attempted: usize, last_error: String },
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub submission_id: SubmissionId,
    pub outcome: ReconciliationOutcome,
    pub audit: AuditRecord,
}

/// Per-item state after normalization and matching.
enum Staged {
    Matched(MatchedItem),
    Settled(ItemOutcome),
    LookupFailed(ItemOutcome, MatchError),
}

/// The shelf reconciliation pipeline.
///
/// `C` is shared by the matcher (reads) and the mutator (writes); pass an
/// `Arc` of the store.
pub struct Reconciler<C, S> {
    matcher: CatalogMatcher<C>,
    mutator: InventoryMutator<C>,
    policy: DecisionPolicy,
    audit: AuditEmitter<S>,
    lookup_concurrency: usize,
    submission_deadline: Duration,
}

impl<C, S> Reconciler<C, S>
where
    C: CatalogStore + Clone,
    S: AuditSink,
{
    pub fn new(catalog: C, sink: S, config: &ReconcileConfig) -> Self {
        Self {
            matcher: CatalogMatcher::new(catalog.clone(), config.matching, config.lookup_timeout),
            mutator: InventoryMutator::new(catalog, config.write_timeout),
            policy: config.decision,
            audit: AuditEmitter::new(sink),
            lookup_concurrency: config.lookup_concurrency.max(1),
            submission_deadline: config.submission_deadline,
        }
    }

    /// Reconcile one submission for `tenant_id`.
    pub async fn reconcile(
        &self,
        tenant_id: TenantId,
        submission: &ShelfSubmission,
    ) -> Result<Reconciliation, ReconcileError> {
        let submission_id = SubmissionId::new();
        let span = info_span!(
            "reconcile",
            tenant = %tenant_id,
            submission = %submission_id,
            items = submission.detected_items.len()
        );

        self.reconcile_inner(tenant_id, submission_id, submission)
            .instrument(span)
            .await
    }

    /// Run [`Reconciler::reconcile`] on its own task.
    ///
    /// Dropping the returned handle detaches the run instead of cancelling it,
    /// so every write that happens is still followed by its audit record.
    pub fn spawn_reconcile(
        self: &Arc<Self>,
        tenant_id: TenantId,
        submission: ShelfSubmission,
    ) -> JoinHandle<Result<Reconciliation, ReconcileError>>
    where
        C: 'static,
    {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.reconcile(tenant_id, &submission).await })
    }

    async fn reconcile_inner(
        &self,
        tenant_id: TenantId,
        submission_id: SubmissionId,
        submission: &ShelfSubmission,
    ) -> Result<Reconciliation, ReconcileError> {
        let deadline = Instant::now() + self.submission_deadline;

        // 1) Normalize + match. Invalid items settle immediately; valid ones are
        //    looked up with bounded concurrency (`buffered` keeps input order).
        let normalized: Vec<Result<DetectedItem, ItemOutcome>> = submission
            .detected_items
            .iter()
            .map(|raw| {
                normalize(raw).map_err(|e| {
                    debug!(item = ?raw.display_name(), error = %e, "rejected detection");
                    ItemOutcome::Error(ItemError::new(
                        raw.display_name().map(str::to_string),
                        None,
                        e.to_string(),
                    ))
                })
            })
            .collect();

        let detected: Vec<&DetectedItem> = normalized.iter().filter_map(|r| r.as_ref().ok()).collect();
        let missing = missing_expected(&submission.context.expected_product_names, detected.iter().copied());

        let lookups = normalized.into_iter().map(|item| async move {
            match item {
                Err(outcome) => Staged::Settled(outcome),
                Ok(detected) => {
                    let name = detected.name().to_string();
                    match self.matcher.match_item(tenant_id, detected, Some(deadline)).await {
                        Ok(m) => Staged::Matched(m),
                        Err(e) => Staged::LookupFailed(
                            ItemOutcome::Error(ItemError::new(
                                Some(name),
                                None,
                                format!("catalog lookup failed: {e}"),
                            )),
                            e,
                        ),
                    }
                }
            }
        });
        let staged: Vec<Staged> = stream::iter(lookups)
            .buffered(self.lookup_concurrency)
            .collect()
            .await;

        // 2) A submission where no lookup succeeded is a collaborator outage,
        //    not a batch of per-item errors.
        let attempted = staged
            .iter()
            .filter(|s| !matches!(s, Staged::Settled(_)))
            .count();
        let failed: Vec<&MatchError> = staged
            .iter()
            .filter_map(|s| match s {
                Staged::LookupFailed(_, e) => Some(e),
                _ => None,
            })
            .collect();
        if attempted > 0 && failed.len() == attempted {
            let last_error = failed.last().map(|e| e.to_string()).unwrap_or_default();
            warn!(attempted, error = %last_error, "catalog unavailable; aborting submission");
            return Err(ReconcileError::CatalogUnavailable { attempted, last_error });
        }

        let confidences: Vec<f64> = staged
            .iter()
            .filter_map(|s| match s {
                Staged::Matched(m) => Some(m.confidence()),
                _ => None,
            })
            .collect();

        // 3) Decide + mutate, in submission order. Writes are sequential so two
        //    detections resolving to the same product see each other's write.
        let mut items: Vec<ItemOutcome> = Vec::with_capacity(staged.len());
        for stage in staged {
            let outcome = match stage {
                Staged::Settled(o) | Staged::LookupFailed(o, _) => o,
                Staged::Matched(m) => self.settle(tenant_id, m, deadline).await,
            };
            items.push(outcome);
        }

        let outcome = ReconciliationOutcome::from_items(items)
            .with_confidences(&confidences)
            .with_missing_expected(missing);

        info!(
            applied = outcome.applied().len(),
            conflicts = outcome.conflicts().len(),
            errors = outcome.errors().len(),
            batch_confidence = outcome.batch_confidence(),
            "shelf reconciliation finished"
        );

        // 4) Audit (best-effort).
        let audit = self.audit.emit(
            &outcome,
            &AuditContext {
                tenant_id,
                submission_id,
                location_hint: submission.context.location_hint.clone(),
                occurred_at: Utc::now(),
            },
        );

        Ok(Reconciliation {
            submission_id,
            outcome,
            audit,
        })
    }

    async fn settle(&self, tenant_id: TenantId, item: MatchedItem, deadline: Instant) -> ItemOutcome {
        let (product_id, new_quantity) = match (self.policy.decide(&item), item.product_id()) {
            (Decision::Apply { new_quantity }, Some(product_id)) => (product_id, new_quantity),
            (Decision::Apply { .. }, None) => {
                // decide() escalates unmatched items first; kept for exhaustiveness.
                return ItemOutcome::Conflict(Conflict::new(item.name(), None, NOT_FOUND_REASON));
            }
            (Decision::Escalate { reason }, product_id) => {
                debug!(item = item.name(), reason = %reason, "escalated for review");
                return ItemOutcome::Conflict(Conflict::new(item.name(), product_id, reason));
            }
        };

        let old_quantity = item.current_quantity();
        let result = self
            .mutator
            .apply(
                tenant_id,
                product_id,
                ExpectedQuantity::Exact(old_quantity),
                new_quantity,
                Some(deadline),
            )
            .await;

        match result {
            Ok(()) => ItemOutcome::Applied(AppliedUpdate {
                product_id,
                item_name: item.name().to_string(),
                old_quantity,
                new_quantity,
                confidence: item.confidence(),
            }),
            Err(MutationError::Conflict { expected, actual }) => ItemOutcome::Conflict(Conflict::new(
                item.name(),
                Some(product_id),
                format!(
                    "Quantity changed during reconciliation (read {expected}, now {actual}); detected {new_quantity}"
                ),
            )),
            Err(e) => ItemOutcome::Error(ItemError::new(
                Some(item.name().to_string()),
                Some(product_id),
                e.to_string(),
            )),
        }
    }
}
