use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Liveness check: answers as long as the process is serving requests.
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
