use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        store::StorageManager,
        types::{document_record::DocumentRecord, user::User},
    },
    utils::config::AppConfig,
};

use super::preparation::RawUpload;
use crate::utils::{analysis_client::AnalysisClient, file_text_extraction::extract_text_from_bytes};

/// Collaborators the pipeline drives. Each method is one narrow contract so
/// tests can swap any of them.
#[async_trait]
pub trait PipelineServices: Send + Sync {
    /// Maps an owner credential to an owner, `None` when it is unknown.
    async fn resolve_owner(&self, credential: &str) -> Result<Option<User>, AppError>;

    async fn extract_text(&self, upload: &RawUpload) -> Result<String, AppError>;

    async fn archive_upload(&self, location: &str, upload: &RawUpload) -> Result<(), AppError>;

    async fn discard_archive(&self, location: &str) -> Result<(), AppError>;

    /// Returns the raw body of a successful analysis call.
    async fn analyze(&self, formatted_text: &str) -> Result<String, AppError>;

    async fn create_record(&self, record: DocumentRecord) -> Result<DocumentRecord, AppError>;

    async fn delete_record(&self, id: &str) -> Result<(), AppError>;
}

pub struct DefaultPipelineServices {
    db: Arc<SurrealDbClient>,
    storage: StorageManager,
    analysis_client: AnalysisClient,
}

impl DefaultPipelineServices {
    pub fn new(db: Arc<SurrealDbClient>, config: &AppConfig, storage: StorageManager) -> Self {
        Self {
            db,
            storage,
            analysis_client: AnalysisClient::new(
                config.analysis_service_url.clone(),
                config.analysis_retry_attempts,
            ),
        }
    }
}

#[async_trait]
impl PipelineServices for DefaultPipelineServices {
    async fn resolve_owner(&self, credential: &str) -> Result<Option<User>, AppError> {
        User::find_by_api_key(credential, &self.db).await
    }

    async fn extract_text(&self, upload: &RawUpload) -> Result<String, AppError> {
        extract_text_from_bytes(upload.bytes.to_vec(), &upload.file_name).await
    }

    async fn archive_upload(&self, location: &str, upload: &RawUpload) -> Result<(), AppError> {
        self.storage.put(location, upload.bytes.clone()).await?;
        Ok(())
    }

    async fn discard_archive(&self, location: &str) -> Result<(), AppError> {
        self.storage.delete(location).await?;
        Ok(())
    }

    async fn analyze(&self, formatted_text: &str) -> Result<String, AppError> {
        self.analysis_client.analyze(formatted_text).await
    }

    async fn create_record(&self, record: DocumentRecord) -> Result<DocumentRecord, AppError> {
        let id = record.id.clone();
        let stored: Option<DocumentRecord> = self.db.store_item(record).await?;
        stored.ok_or_else(|| {
            AppError::InternalError(format!("document {id} was not returned after create"))
        })
    }

    async fn delete_record(&self, id: &str) -> Result<(), AppError> {
        self.db.delete_item::<DocumentRecord>(id).await?;
        Ok(())
    }
}
