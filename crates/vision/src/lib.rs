//! `shelfsync-vision`
//!
//! **Responsibility:** boundary with the vision-analysis collaborator.
//!
//! This crate does not run inference. It only accepts what the vision model
//! reported for a shelf photo and shapes it into validated detections:
//! - It must not look anything up in the catalog.
//! - It must not mutate inventory state.

pub mod detection;

pub use detection::{normalize, normalize_all, BoundingBox, DetectedItem, RawDetection};
