use serde::{Deserialize, Serialize};

use crate::matching::MatchedItem;

/// Default confidence a match must exceed to be applied without review.
pub const DEFAULT_AUTO_APPLY_MIN_CONFIDENCE: f64 = 0.85;

/// Default relative change a match must stay under to be applied without review.
pub const DEFAULT_MAX_RELATIVE_DELTA: f64 = 0.5;

/// Escalation reason for detections with no catalog product.
pub const NOT_FOUND_REASON: &str = "Product not found in catalog";

/// Outcome of the auto-apply policy for one matched item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    Apply { new_quantity: i64 },
    Escalate { reason: String },
}

impl Decision {
    pub fn is_apply(&self) -> bool {
        matches!(self, Decision::Apply { .. })
    }
}

/// Confidence/variance policy deciding between automatic writes and human review.
///
/// Both bounds are strict: a match is applied only when
/// `confidence > auto_apply_min_confidence` and
/// `relative_delta < max_relative_delta`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionPolicy {
    pub auto_apply_min_confidence: f64,
    pub max_relative_delta: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            auto_apply_min_confidence: DEFAULT_AUTO_APPLY_MIN_CONFIDENCE,
            max_relative_delta: DEFAULT_MAX_RELATIVE_DELTA,
        }
    }
}

impl DecisionPolicy {
    pub fn new(auto_apply_min_confidence: f64, max_relative_delta: f64) -> Self {
        Self {
            auto_apply_min_confidence,
            max_relative_delta,
        }
    }

    /// Classify one matched item. Pure; no side effects.
    pub fn decide(&self, item: &MatchedItem) -> Decision {
        if !item.is_matched() {
            return Decision::Escalate {
                reason: NOT_FOUND_REASON.to_string(),
            };
        }

        let current = item.current_quantity();
        let detected = item.detected_quantity();
        let confidence = item.confidence();

        if confidence > self.auto_apply_min_confidence
            && relative_delta(current, detected) < self.max_relative_delta
        {
            return Decision::Apply {
                new_quantity: detected,
            };
        }

        Decision::Escalate {
            reason: format!(
                "Large quantity change ({current} → {detected}) or low confidence ({confidence})"
            ),
        }
    }
}

/// `|current - detected| / max(current, 1)`.
///
/// The floor of 1 keeps a recorded stock of zero (or a negative stock left by
/// oversells) from dividing by zero; any change from zero is then measured
/// against one unit.
pub fn relative_delta(current: i64, detected: i64) -> f64 {
    let delta = current.abs_diff(detected) as f64;
    delta / current.max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogProduct;
    use crate::matching::{resolve, MatchPolicy};
    use shelfsync_core::ProductId;
    use shelfsync_vision::DetectedItem;

    fn matched(name: &str, detected: i64, confidence: f64, current: i64) -> MatchedItem {
        let product = CatalogProduct::new(ProductId::new(), "SKU-1", name, current);
        resolve(
            DetectedItem::new(name, detected, confidence).unwrap(),
            &[product],
            &MatchPolicy::default(),
        )
    }

    #[test]
    fn small_change_with_high_confidence_applies() {
        let d = DecisionPolicy::default().decide(&matched("Widget A", 12, 0.95, 10));
        assert_eq!(d, Decision::Apply { new_quantity: 12 });
    }

    #[test]
    fn unmatched_item_escalates_as_not_found() {
        let item = resolve(
            DetectedItem::new("Unknown Gadget", 5, 0.9).unwrap(),
            &[],
            &MatchPolicy::default(),
        );
        let d = DecisionPolicy::default().decide(&item);
        assert_eq!(
            d,
            Decision::Escalate {
                reason: "Product not found in catalog".to_string()
            }
        );
    }

    #[test]
    fn large_change_escalates_with_literal_values() {
        let d = DecisionPolicy::default().decide(&matched("Widget B", 100, 0.9, 5));
        match d {
            Decision::Escalate { reason } => {
                assert_eq!(
                    reason,
                    "Large quantity change (5 → 100) or low confidence (0.9)"
                );
            }
            other => panic!("Expected Escalate, got {other:?}"),
        }
    }

    #[test]
    fn low_confidence_escalates_even_for_small_change() {
        let d = DecisionPolicy::default().decide(&matched("Widget C", 8, 0.6, 7));
        assert!(!d.is_apply());
    }

    #[test]
    fn thresholds_are_strict() {
        let policy = DecisionPolicy::default();
        // confidence exactly at the bound does not apply
        assert!(!policy.decide(&matched("W", 10, 0.85, 10)).is_apply());
        // relative delta exactly at the bound does not apply
        assert!(!policy.decide(&matched("W", 15, 0.95, 10)).is_apply());
    }

    #[test]
    fn zero_stock_uses_floor_of_one() {
        assert_eq!(relative_delta(0, 0), 0.0);
        assert_eq!(relative_delta(0, 3), 3.0);
        assert!(!DecisionPolicy::default().decide(&matched("W", 1, 0.99, 0)).is_apply());
        assert!(DecisionPolicy::default().decide(&matched("W", 0, 0.99, 0)).is_apply());
    }

    #[test]
    fn thresholds_are_configurable() {
        let lenient = DecisionPolicy::new(0.5, 20.0);
        assert!(lenient.decide(&matched("Widget B", 100, 0.9, 5)).is_apply());
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: with a small relative change, raising confidence past the
            /// bound flips Escalate to Apply and never the other way round.
            #[test]
            fn confidence_is_monotonic(
                current in 1i64..10_000,
                low in 0.0f64..=0.85,
                high in 0.850_001f64..=1.0,
            ) {
                let policy = DecisionPolicy::default();
                let detected = current; // relative delta 0
                let d_low = policy.decide(&matched("W", detected, low, current));
                let d_high = policy.decide(&matched("W", detected, high, current));
                prop_assert!(!d_low.is_apply());
                prop_assert!(d_high.is_apply());
            }

            /// Property: unmatched items never reach the auto-apply branch.
            #[test]
            fn unmatched_never_applies(qty in 0i64..1_000_000, confidence in 0.0f64..=1.0) {
                let item = resolve(
                    DetectedItem::new("Nothing", qty, confidence).unwrap(),
                    &[],
                    &MatchPolicy::default(),
                );
                let d = DecisionPolicy::new(0.0, f64::INFINITY).decide(&item);
                prop_assert_eq!(d, Decision::Escalate { reason: NOT_FOUND_REASON.to_string() });
            }

            /// Property: Apply always carries the detected quantity.
            #[test]
            fn apply_sets_detected_quantity(current in 0i64..10_000, detected in 0i64..10_000) {
                if let Decision::Apply { new_quantity } =
                    DecisionPolicy::default().decide(&matched("W", detected, 0.99, current))
                {
                    prop_assert_eq!(new_quantity, detected);
                }
            }
        }
    }
}
