use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use common::storage::types::user::User;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RegisterParams {
    pub email: String,
}

/// Creates an owner and issues its first API key. The key is only shown here
/// and on rotation.
pub async fn register_user(
    State(state): State<ApiState>,
    Json(params): Json<RegisterParams>,
) -> Result<impl IntoResponse, ApiError> {
    let user = User::create_new(params.email, &state.db).await?;
    let api_key = User::set_api_key(&user.id, &state.db).await?;

    info!(user_id = %user.id, "Registered user");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": user.id, "email": user.email, "api_key": api_key })),
    ))
}

pub async fn current_user(Extension(user): Extension<User>) -> impl IntoResponse {
    Json(json!({ "id": user.id, "email": user.email }))
}

/// Replaces the caller's key; the old one stops resolving immediately.
pub async fn rotate_api_key(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let api_key = User::set_api_key(&user.id, &state.db).await?;

    info!(user_id = %user.id, "Rotated API key");

    Ok(Json(json!({ "api_key": api_key })))
}

pub async fn revoke_api_key(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    User::revoke_api_key(&user.id, &state.db).await?;

    info!(user_id = %user.id, "Revoked API key");

    Ok(StatusCode::NO_CONTENT)
}
