use std::time::Duration;

use tokio::time::Instant;

/// Time allowed for one collaborator call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct CallBudget {
    pub duration: Duration,
    /// The submission deadline, not the per-call timeout, is the binding limit.
    pub clipped: bool,
}

/// Clip a per-call timeout to what is left of the submission deadline.
///
/// Returns `None` once the deadline has passed.
pub(crate) fn call_budget(timeout: Duration, deadline: Option<Instant>) -> Option<CallBudget> {
    let Some(deadline) = deadline else {
        return Some(CallBudget { duration: timeout, clipped: false });
    };

    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return None;
    }
    if remaining < timeout {
        Some(CallBudget { duration: remaining, clipped: true })
    } else {
        Some(CallBudget { duration: timeout, clipped: false })
    }
}
