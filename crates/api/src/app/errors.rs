use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use shelfsync_infra::ReconcileError;

pub fn reconcile_error_to_response(err: ReconcileError) -> axum::response::Response {
    match err {
        ReconcileError::CatalogUnavailable { .. } => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "catalog_unavailable", err.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
