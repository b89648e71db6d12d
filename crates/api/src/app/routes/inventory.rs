use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use shelfsync_infra::ShelfSubmission;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new().route("/shelf-reconciliations", post(reconcile_shelf))
}

/// Reconcile one shelf photo's detections against the tenant's catalog.
///
/// The run lives on its own task: a client that disconnects mid-batch does not
/// cut it short between a write and the audit record.
pub async fn reconcile_shelf(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<ShelfSubmission>,
) -> axum::response::Response {
    let run = match services.reconciler.spawn_reconcile(tenant.tenant_id(), body).await {
        Ok(run) => run,
        Err(e) => {
            return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string());
        }
    };

    match run {
        Ok(r) => (
            StatusCode::OK,
            Json(dto::reconciliation_to_dto(&r, services.review_confidence_floor)),
        )
            .into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}
