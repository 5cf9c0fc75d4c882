use std::{future::Future, time::Duration};

use common::{
    error::AppError,
    storage::types::{document_record::DocumentRecord, user::User},
};
use tokio_util::sync::CancellationToken;
use tracing::error;

use super::{
    compensation::{Compensation, CompensationLog},
    config::IngestionConfig,
    preparation::RawUpload,
    services::PipelineServices,
};
use crate::types::analysis_response::AnalysisResult;

pub struct PipelineContext<'a> {
    pub run_id: String,
    pub pipeline_config: &'a IngestionConfig,
    pub services: &'a dyn PipelineServices,
    pub cancel: &'a CancellationToken,
    pub upload: Option<RawUpload>,
    pub owner: Option<User>,
    pub extracted_text: Option<String>,
    pub formatted_text: Option<String>,
    pub archive_location: Option<String>,
    pub raw_analysis: Option<String>,
    pub analysis: Option<AnalysisResult>,
    compensations: CompensationLog,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        run_id: String,
        pipeline_config: &'a IngestionConfig,
        services: &'a dyn PipelineServices,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            run_id,
            pipeline_config,
            services,
            cancel,
            upload: None,
            owner: None,
            extracted_text: None,
            formatted_text: None,
            archive_location: None,
            raw_analysis: None,
            analysis: None,
            compensations: CompensationLog::default(),
        }
    }

    pub fn upload(&self) -> Result<&RawUpload, AppError> {
        self.upload
            .as_ref()
            .ok_or_else(|| AppError::InternalError("upload expected to be validated".into()))
    }

    pub fn owner(&self) -> Result<&User, AppError> {
        self.owner
            .as_ref()
            .ok_or_else(|| AppError::InternalError("owner expected to be resolved".into()))
    }

    pub fn take_extracted_text(&mut self) -> Result<String, AppError> {
        self.extracted_text.take().ok_or_else(|| {
            AppError::InternalError("extracted text expected to be available".into())
        })
    }

    pub fn formatted_text(&self) -> Result<&str, AppError> {
        self.formatted_text.as_deref().ok_or_else(|| {
            AppError::InternalError("formatted text expected to be available".into())
        })
    }

    pub fn take_raw_analysis(&mut self) -> Result<String, AppError> {
        self.raw_analysis.take().ok_or_else(|| {
            AppError::InternalError("analysis body expected to be available".into())
        })
    }

    /// Moves the parsed artifacts into a new, not yet persisted, record.
    pub fn build_record(&mut self) -> Result<DocumentRecord, AppError> {
        let analysis = self.analysis.take().ok_or_else(|| {
            AppError::InternalError("analysis expected to be available for persistence".into())
        })?;
        let document_text = self.formatted_text.take().ok_or_else(|| {
            AppError::InternalError("formatted text expected to be available for persistence".into())
        })?;
        let name = self.upload()?.file_name.clone();
        let owner_id = self.owner()?.id.clone();

        Ok(DocumentRecord::new(
            name,
            document_text,
            analysis.raw_payload,
            analysis.security_percentage,
            analysis.duration_seconds,
            analysis.overall_risk,
            owner_id,
        ))
    }

    pub fn register_compensation(&mut self, compensation: Compensation) {
        self.compensations.register(compensation);
    }

    pub fn commit(&mut self) {
        self.compensations.commit();
    }

    /// Fails with [`AppError::Cancelled`] once the run's token has fired.
    pub fn checkpoint(&self, stage: &'static str) -> Result<(), AppError> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled(stage));
        }
        Ok(())
    }

    /// Races `work` against cancellation and, when `limit` is set, a timeout.
    ///
    /// Losing the race drops `work`. Anything it already handed to
    /// `spawn_blocking` (PDF and DOCX extraction) keeps running until it
    /// finishes on its own; only the result is thrown away.
    pub async fn bounded<T, F>(
        &self,
        stage: &'static str,
        limit: Option<Duration>,
        work: F,
    ) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let timed = async {
            match limit {
                Some(limit) => tokio::time::timeout(limit, work)
                    .await
                    .map_err(|_| AppError::Timeout {
                        stage,
                        secs: limit.as_secs(),
                    })?,
                None => work.await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(AppError::Cancelled(stage)),
            result = timed => result,
        }
    }

    /// Rolls back every registered compensation and hands the error back.
    pub async fn abort(&mut self, err: AppError) -> AppError {
        let pending = self.compensations.entries().len();
        let applied = self
            .compensations
            .rollback(self.services, &self.run_id)
            .await;

        error!(
            run_id = %self.run_id,
            owner_id = self.owner.as_ref().map_or("unresolved", |owner| owner.id.as_str()),
            error_class = ?err.class(),
            compensations_pending = pending,
            compensations_applied = applied,
            error = %err,
            "ingestion pipeline aborted"
        );
        err
    }
}
