use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use chrono::Utc;
use common::storage::types::{
    dashboard_summary::DashboardSummary, document_record::DocumentRecord, user::User,
};
use ingestion_pipeline::RawUpload;
use serde_json::json;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError, middleware_api_auth::extract_api_key};

#[derive(Debug, TryFromMultipart)]
pub struct UploadDocumentParams {
    // Size is enforced by the pipeline so the caller gets a validation error.
    #[form_data(limit = "unlimited")]
    pub file: Option<FieldData<NamedTempFile>>,
}

/// Runs an upload through the ingestion pipeline. The pipeline resolves the
/// owner itself, after the upload gate, so this route sits outside `api_auth`.
pub async fn upload_document(
    State(state): State<ApiState>,
    headers: HeaderMap,
    TypedMultipart(input): TypedMultipart<UploadDocumentParams>,
) -> Result<impl IntoResponse, ApiError> {
    let credential = extract_api_key(&headers).unwrap_or_default();
    let upload = match input.file {
        Some(field) => Some(RawUpload::from_field(field).await?),
        None => None,
    };

    info!(
        has_file = upload.is_some(),
        upload_bytes = upload.as_ref().map_or(0, RawUpload::size),
        "Received document upload"
    );

    let record = state.pipeline.ingest(upload, &credential).await?;

    Ok((StatusCode::OK, Json(json!({ "id": record.id }))))
}

pub async fn list_documents(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let previews = DocumentRecord::list_previews(&user.id, &state.db).await?;

    Ok(Json(previews))
}

pub async fn get_document(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let document = DocumentRecord::find_for_owner(&id, &user.id, &state.db).await?;

    Ok(Json(document))
}

pub async fn get_dashboard(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let today = Utc::now().date_naive();
    let summary = DashboardSummary::for_owner(&user.id, today, &state.db).await?;

    Ok(Json(summary))
}
