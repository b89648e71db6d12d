use serde::Serialize;

use shelfsync_core::ProductId;
use shelfsync_vision::DetectedItem;

use crate::catalog::CatalogProduct;

/// Default cap on catalog candidates considered per detection.
pub const DEFAULT_CANDIDATE_LIMIT: usize = 5;

/// Default confidence multiplier for detections with no catalog anchor.
pub const DEFAULT_UNMATCHED_PENALTY: f64 = 0.5;

/// Tunables for resolving detections against the catalog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    pub candidate_limit: usize,
    pub unmatched_penalty: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            unmatched_penalty: DEFAULT_UNMATCHED_PENALTY,
        }
    }
}

/// The catalog product a detection resolved to, as read at match time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedProduct {
    pub product_id: ProductId,
    pub sku: String,
    pub title: String,
    /// Baseline used for the decision and for the conditional write.
    pub current_quantity: i64,
}

impl From<&CatalogProduct> for MatchedProduct {
    fn from(p: &CatalogProduct) -> Self {
        Self {
            product_id: p.product_id,
            sku: p.sku.clone(),
            title: p.title.clone(),
            current_quantity: p.quantity,
        }
    }
}

/// A detection paired with its catalog resolution.
///
/// Unmatched items carry no product, report a current quantity of 0 and have
/// their confidence multiplied by the unmatched penalty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedItem {
    detected: DetectedItem,
    product: Option<MatchedProduct>,
    confidence: f64,
}

impl MatchedItem {
    pub fn matched(detected: DetectedItem, product: MatchedProduct) -> Self {
        let confidence = detected.confidence();
        Self {
            detected,
            product: Some(product),
            confidence,
        }
    }

    pub fn unmatched(detected: DetectedItem, penalty: f64) -> Self {
        let confidence = detected.confidence() * penalty;
        Self {
            detected,
            product: None,
            confidence,
        }
    }

    pub fn name(&self) -> &str {
        self.detected.name()
    }

    pub fn detected_quantity(&self) -> i64 {
        self.detected.estimated_quantity()
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product.as_ref().map(|p| p.product_id)
    }

    pub fn current_quantity(&self) -> i64 {
        self.product.as_ref().map(|p| p.current_quantity).unwrap_or(0)
    }

    /// Effective confidence (after any unmatched penalty).
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn is_matched(&self) -> bool {
        self.product.is_some()
    }
}

/// Resolve a detection against the candidates the catalog returned for it.
///
/// `candidates` must be in the catalog's default ordering. Only the first
/// `candidate_limit` are considered. A candidate whose title or SKU equals the
/// detected name wins; otherwise the first candidate is taken. There is no
/// edit-distance ranking, so "Widget" on a shelf holding both "Widget Mini" and
/// "Widget Max" resolves to whichever the catalog lists first.
pub fn resolve(detected: DetectedItem, candidates: &[CatalogProduct], policy: &MatchPolicy) -> MatchedItem {
    let considered = &candidates[..candidates.len().min(policy.candidate_limit)];

    let chosen = considered
        .iter()
        .find(|p| p.is_exact_match(detected.name()))
        .or_else(|| considered.first());

    match chosen {
        Some(product) => MatchedItem::matched(detected, MatchedProduct::from(product)),
        None => MatchedItem::unmatched(detected, policy.unmatched_penalty),
    }
}

/// Expected product names for which no detection was reported.
///
/// A name counts as seen when some detected name contains it
/// (case-insensitive). Order follows `expected`; duplicates are collapsed.
pub fn missing_expected<'a>(
    expected: &[String],
    detected: impl IntoIterator<Item = &'a DetectedItem> + Clone,
) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for name in expected {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            continue;
        }
        let seen = detected
            .clone()
            .into_iter()
            .any(|d| d.name().to_lowercase().contains(&needle));
        if !seen && !missing.iter().any(|m| m.trim().to_lowercase() == needle) {
            missing.push(name.trim().to_string());
        }
    }
    missing
}
