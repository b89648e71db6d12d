//! Process-wide logging setup shared by the shelfsync binaries.

/// Initialize tracing/logging.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

pub mod tracing;
