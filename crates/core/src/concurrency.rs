//! Optimistic concurrency for absolute quantity writes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Expectation about a product's stored quantity at write time.
///
/// Quantity writes are absolute sets ("last write wins"). Carrying the baseline
/// read at match time lets the store reject a write whose baseline went stale in
/// between, instead of silently clobbering a concurrent update.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedQuantity {
    /// Skip the check (manual overrides, migrations).
    Any,
    /// Require the stored quantity to still equal this value.
    Exact(i64),
}

/// The stored quantity no longer equals the expected baseline.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
#[error("quantity changed since it was read (expected {expected}, actual {actual})")]
pub struct QuantityMismatch {
    pub expected: i64,
    pub actual: i64,
}

impl ExpectedQuantity {
    pub fn matches(self, actual: i64) -> bool {
        match self {
            ExpectedQuantity::Any => true,
            ExpectedQuantity::Exact(q) => q == actual,
        }
    }

    pub fn check(self, actual: i64) -> Result<(), QuantityMismatch> {
        match self {
            ExpectedQuantity::Exact(expected) if expected != actual => {
                Err(QuantityMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }
}
