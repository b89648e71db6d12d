//! Inventory reconciliation domain module.
//!
//! This crate contains the decision logic that turns shelf detections into
//! quantity updates or human-review items, implemented purely as deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod audit;
pub mod catalog;
pub mod matching;
pub mod outcome;
pub mod policy;

pub use audit::{summarize, AuditContext, AuditRecord};
pub use catalog::CatalogProduct;
pub use matching::{missing_expected, resolve, MatchPolicy, MatchedItem, MatchedProduct};
pub use outcome::{
    AppliedUpdate, Conflict, ItemError, ItemOutcome, ReconciliationOutcome, ReviewAction,
};
pub use policy::{relative_delta, Decision, DecisionPolicy, NOT_FOUND_REASON};
