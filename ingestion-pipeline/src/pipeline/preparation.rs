use axum_typed_multipart::FieldData;
use bytes::Bytes;
use chrono::Utc;
use common::error::AppError;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// An uploaded document, alive for exactly one pipeline run.
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub file_name: String,
    pub bytes: Bytes,
}

impl RawUpload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Byte length of the payload.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Reads a multipart temp file into memory. The temp file is removed when
    /// `field` is dropped at the end of this call.
    pub async fn from_field(field: FieldData<NamedTempFile>) -> Result<Self, AppError> {
        let file_name = field
            .metadata
            .file_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::Validation("The uploaded file has no name".into()))?
            .to_string();

        let bytes = tokio::fs::read(field.contents.path()).await?;

        Ok(Self::new(file_name, bytes))
    }
}

/// Builds a collision-resistant archive location for an owner's upload:
/// `<namespace>/<owner>/document_for_user_<owner>_<millis>_<suffix>[.<ext>]`.
pub(crate) fn archive_location(namespace: &str, owner_id: &str, file_name: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = Uuid::new_v4().simple().to_string();
    let suffix = suffix.get(..8).unwrap_or(&suffix);
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();

    format!("{namespace}/{owner_id}/document_for_user_{owner_id}_{millis}_{suffix}{extension}")
}
