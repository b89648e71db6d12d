//! `shelfsync-core`: shared primitives for the reconciliation pipeline.
//!
//! This crate contains **pure** building blocks (no IO, no async, no storage).

pub mod concurrency;
pub mod error;
pub mod id;

pub use concurrency::{ExpectedQuantity, QuantityMismatch};
pub use error::{DomainError, DomainResult};
pub use id::{ProductId, SubmissionId, TenantId};
