use serde::{Deserialize, Serialize};

use shelfsync_core::ProductId;

/// A quantity write that was decided and persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedUpdate {
    pub product_id: ProductId,
    pub item_name: String,
    pub old_quantity: i64,
    pub new_quantity: i64,
    pub confidence: f64,
}

/// What an operator has to do with a conflict.
///
/// Single-variant today; kept as a type so the wire tag cannot drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    RequiresHumanReview,
}

/// An item that needs a human decision instead of an automatic write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub item_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    pub reason: String,
    pub action: ReviewAction,
}

impl Conflict {
    pub fn new(item_name: impl Into<String>, product_id: Option<ProductId>, reason: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            product_id,
            reason: reason.into(),
            action: ReviewAction::RequiresHumanReview,
        }
    }
}

/// An item that could not be processed (invalid input, failed lookup or write).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    pub message: String,
}

impl ItemError {
    pub fn new(item_name: Option<String>, product_id: Option<ProductId>, message: impl Into<String>) -> Self {
        Self {
            item_name,
            product_id,
            message: message.into(),
        }
    }

    /// Label used in reports: item name, else product id, else a placeholder.
    pub fn label(&self) -> String {
        match (&self.item_name, &self.product_id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => id.to_string(),
            (None, None) => "<unnamed item>".to_string(),
        }
    }
}

/// Final disposition of exactly one submitted detection.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Applied(AppliedUpdate),
    Conflict(Conflict),
    Error(ItemError),
}

/// Aggregate result of one reconciliation run.
///
/// Built from one [`ItemOutcome`] per submitted detection, so the three buckets
/// always add up to the submission size. Each bucket keeps submission order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationOutcome {
    applied: Vec<AppliedUpdate>,
    conflicts: Vec<Conflict>,
    errors: Vec<ItemError>,
    /// Expected products nobody detected (informational, not counted).
    #[serde(default)]
    missing_expected: Vec<String>,
    batch_confidence: f64,
}

impl ReconciliationOutcome {
    pub fn from_items(items: impl IntoIterator<Item = ItemOutcome>) -> Self {
        let mut outcome = Self {
            batch_confidence: 1.0,
            ..Self::default()
        };
        for item in items {
            match item {
                ItemOutcome::Applied(a) => outcome.applied.push(a),
                ItemOutcome::Conflict(c) => outcome.conflicts.push(c),
                ItemOutcome::Error(e) => outcome.errors.push(e),
            }
        }
        outcome
    }

    pub fn with_missing_expected(mut self, missing: Vec<String>) -> Self {
        self.missing_expected = missing;
        self
    }

    /// Set the mean confidence from the per-item effective confidences.
    ///
    /// An empty set leaves the batch confidence at 1.0 (nothing to doubt).
    pub fn with_confidences(mut self, confidences: &[f64]) -> Self {
        self.batch_confidence = if confidences.is_empty() {
            1.0
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };
        self
    }

    pub fn applied(&self) -> &[AppliedUpdate] {
        &self.applied
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn errors(&self) -> &[ItemError] {
        &self.errors
    }

    pub fn missing_expected(&self) -> &[String] {
        &self.missing_expected
    }

    pub fn batch_confidence(&self) -> f64 {
        self.batch_confidence
    }

    /// Number of detections accounted for across all three buckets.
    pub fn total(&self) -> usize {
        self.applied.len() + self.conflicts.len() + self.errors.len()
    }

    /// Whether a human has to look at this run.
    ///
    /// `floor` is chosen by the caller; any conflict forces review regardless.
    pub fn needs_human_review(&self, floor: f64) -> bool {
        !self.conflicts.is_empty() || self.batch_confidence < floor
    }
}
