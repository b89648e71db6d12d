use serde::Serialize;

use shelfsync_inventory::{AppliedUpdate, Conflict, ItemError};
use shelfsync_infra::Reconciliation;

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationCounts {
    pub applied: usize,
    pub conflicts: usize,
    pub errors: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResponse {
    pub submission_id: String,
    pub counts: ReconciliationCounts,
    pub applied: Vec<AppliedUpdate>,
    pub conflicts: Vec<Conflict>,
    pub errors: Vec<ItemError>,
    pub missing_expected: Vec<String>,
    pub batch_confidence: f64,
    pub needs_human_review: bool,
}

pub fn reconciliation_to_dto(r: &Reconciliation, review_confidence_floor: f64) -> ReconciliationResponse {
    let outcome = &r.outcome;
    ReconciliationResponse {
        submission_id: r.submission_id.to_string(),
        counts: ReconciliationCounts {
            applied: outcome.applied().len(),
            conflicts: outcome.conflicts().len(),
            errors: outcome.errors().len(),
        },
        applied: outcome.applied().to_vec(),
        conflicts: outcome.conflicts().to_vec(),
        errors: outcome.errors().to_vec(),
        missing_expected: outcome.missing_expected().to_vec(),
        batch_confidence: outcome.batch_confidence(),
        needs_human_review: outcome.needs_human_review(review_confidence_floor),
    }
}
