//! Catalog matcher: resolves detections to catalog products.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use shelfsync_core::TenantId;
use shelfsync_inventory::{resolve, MatchPolicy, MatchedItem};
use shelfsync_vision::DetectedItem;

use crate::catalog::{CatalogError, CatalogStore};
use crate::timeouts::call_budget;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("catalog lookup timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("submission deadline exceeded before catalog lookup completed")]
    DeadlineExceeded,

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Looks detections up in the catalog and picks a candidate.
///
/// Read-only: the matcher never writes to the catalog.
#[derive(Debug, Clone)]
pub struct CatalogMatcher<C> {
    catalog: C,
    policy: MatchPolicy,
    lookup_timeout: Duration,
}

impl<C> CatalogMatcher<C>
where
    C: CatalogStore,
{
    pub fn new(catalog: C, policy: MatchPolicy, lookup_timeout: Duration) -> Self {
        Self {
            catalog,
            policy,
            lookup_timeout,
        }
    }

    /// Resolve one detection.
    ///
    /// An empty candidate list is not an error: it yields an unmatched item.
    pub async fn match_item(
        &self,
        tenant_id: TenantId,
        detected: DetectedItem,
        deadline: Option<Instant>,
    ) -> Result<MatchedItem, MatchError> {
        let budget = call_budget(self.lookup_timeout, deadline).ok_or(MatchError::DeadlineExceeded)?;

        let lookup = self
            .catalog
            .find_by_name_contains(tenant_id, detected.name(), self.policy.candidate_limit);

        let result = tokio::time::timeout(budget.duration, lookup).await;
        let candidates = match result {
            Ok(result) => result?,
            Err(_) if budget.clipped => return Err(MatchError::DeadlineExceeded),
            Err(_) => return Err(MatchError::Timeout(budget.duration)),
        };

        let matched = resolve(detected, &candidates, &self.policy);
        debug!(
            tenant = %tenant_id,
            item = matched.name(),
            candidates = candidates.len(),
            product = ?matched.product_id(),
            "resolved detection"
        );
        Ok(matched)
    }
}
