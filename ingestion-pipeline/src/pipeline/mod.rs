mod compensation;
mod config;
mod context;
mod preparation;
mod services;
mod stages;
mod state;

pub use config::{IngestionConfig, IngestionTuning};
pub use preparation::RawUpload;
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultPipelineServices, PipelineServices};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, store::StorageManager, types::document_record::DocumentRecord},
    utils::config::AppConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use self::{
    context::PipelineContext,
    stages::{
        analyze, archive_original, extract_text, identify_owner, parse_analysis, persist,
        segment_text, validate_upload,
    },
    state::ready,
};

#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    pipeline_config: IngestionConfig,
    services: Arc<dyn PipelineServices>,
}

impl IngestionPipeline {
    pub fn new(db: Arc<SurrealDbClient>, config: &AppConfig, storage: StorageManager) -> Self {
        let services = DefaultPipelineServices::new(db, config, storage);
        Self::with_services(
            IngestionConfig::from_app_config(config),
            Arc::new(services),
        )
    }

    pub fn with_services(
        pipeline_config: IngestionConfig,
        services: Arc<dyn PipelineServices>,
    ) -> Self {
        Self {
            pipeline_config,
            services,
        }
    }

    /// Runs one upload through every gate and returns the persisted record.
    ///
    /// On success exactly one record exists for the upload. On any error no
    /// record exists and the archived original, if any, has been discarded.
    pub async fn ingest(
        &self,
        upload: Option<RawUpload>,
        credential: &str,
    ) -> Result<DocumentRecord, AppError> {
        self.ingest_with_cancellation(upload, credential, CancellationToken::new())
            .await
    }

    #[tracing::instrument(
        skip_all,
        fields(
            run_id = tracing::field::Empty,
            file_name = upload.as_ref().map_or("<none>", |u| u.file_name.as_str()),
            upload_bytes = upload.as_ref().map_or(0, RawUpload::size)
        )
    )]
    pub async fn ingest_with_cancellation(
        &self,
        upload: Option<RawUpload>,
        credential: &str,
        cancel: CancellationToken,
    ) -> Result<DocumentRecord, AppError> {
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        let mut ctx = PipelineContext::new(
            run_id,
            &self.pipeline_config,
            self.services.as_ref(),
            &cancel,
        );

        match Self::drive_pipeline(&mut ctx, upload, credential).await {
            Ok(record) => Ok(record),
            Err(err) => Err(ctx.abort(err).await),
        }
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }

    async fn drive_pipeline(
        ctx: &mut PipelineContext<'_>,
        upload: Option<RawUpload>,
        credential: &str,
    ) -> Result<DocumentRecord, AppError> {
        let machine = ready();
        let pipeline_started = Instant::now();

        let machine = validate_upload(machine, ctx, upload).await?;
        let machine = identify_owner(machine, ctx, credential).await?;

        let stage_start = Instant::now();
        let machine = extract_text(machine, ctx).await?;
        let extract_duration = stage_start.elapsed();

        let machine = segment_text(machine, ctx).await?;

        let stage_start = Instant::now();
        let machine = archive_original(machine, ctx).await?;
        let archive_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = analyze(machine, ctx).await?;
        let analyze_duration = stage_start.elapsed();

        let machine = parse_analysis(machine, ctx).await?;

        let stage_start = Instant::now();
        let (_machine, record) = persist(machine, ctx).await?;
        let persist_duration = stage_start.elapsed();

        info!(
            run_id = %ctx.run_id,
            owner_id = %record.owner_id,
            document_id = %record.id,
            risk_level = %record.risk_level,
            archive_location = ctx.archive_location.as_deref().unwrap_or_default(),
            total_ms = Self::duration_millis(pipeline_started.elapsed()),
            extract_ms = Self::duration_millis(extract_duration),
            archive_ms = Self::duration_millis(archive_duration),
            analyze_ms = Self::duration_millis(analyze_duration),
            persist_ms = Self::duration_millis(persist_duration),
            "ingestion pipeline finished"
        );

        Ok(record)
    }
}
