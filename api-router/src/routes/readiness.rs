use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Readiness check: 200 once the document store answers queries, else 503.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    let storage = format!("{:?}", state.config.storage).to_lowercase();

    match state.db.client.query("RETURN true").await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "checks": { "db": "ok", "storage": storage }
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "checks": { "db": "fail", "storage": storage },
                    "reason": e.to_string()
                })),
            )
        }
    }
}
