use common::{
    error::AppError,
    storage::types::document_record::DocumentRecord,
    utils::ingest_limits::{validate_formatted_text, validate_upload_size},
};
use state_machines::core::GuardError;
use tracing::{debug, info, instrument};

use super::{
    compensation::Compensation,
    context::PipelineContext,
    preparation::{archive_location, RawUpload},
    state::{
        Analyzed, Archived, IngestionMachine, OwnerResolved, Parsed, Persisted, Ready, Segmented,
        TextExtracted, Validated,
    },
};
use crate::{
    types::analysis_response::parse_analysis_response,
    utils::sentence_segmenter::{char_units, segment},
};

#[instrument(level = "trace", skip_all, fields(run_id = %ctx.run_id))]
pub async fn validate_upload(
    machine: IngestionMachine<(), Ready>,
    ctx: &mut PipelineContext<'_>,
    upload: Option<RawUpload>,
) -> Result<IngestionMachine<(), Validated>, AppError> {
    ctx.checkpoint("validate")?;
    validate_upload_size(upload.as_ref().map(RawUpload::size))?;

    ctx.upload = upload;

    machine
        .validate()
        .map_err(|(_, guard)| map_guard_error("validate", &guard))
}

#[instrument(level = "trace", skip_all, fields(run_id = %ctx.run_id))]
pub async fn identify_owner(
    machine: IngestionMachine<(), Validated>,
    ctx: &mut PipelineContext<'_>,
    credential: &str,
) -> Result<IngestionMachine<(), OwnerResolved>, AppError> {
    ctx.checkpoint("identify")?;

    let credential = credential.trim();
    if credential.is_empty() {
        return Err(AppError::Auth("No owner credential was provided".into()));
    }

    let owner = ctx
        .services
        .resolve_owner(credential)
        .await?
        .ok_or_else(|| AppError::Auth("The owner credential is not recognised".into()))?;

    debug!(run_id = %ctx.run_id, owner_id = %owner.id, "ingestion owner resolved");
    ctx.owner = Some(owner);

    machine
        .identify()
        .map_err(|(_, guard)| map_guard_error("identify", &guard))
}

#[instrument(level = "trace", skip_all, fields(run_id = %ctx.run_id))]
pub async fn extract_text(
    machine: IngestionMachine<(), OwnerResolved>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), TextExtracted>, AppError> {
    ctx.checkpoint("extract")?;

    let upload = ctx.upload()?;
    let limit = ctx.pipeline_config.tuning.extraction_timeout;
    let text = ctx
        .bounded("extract", Some(limit), ctx.services.extract_text(upload))
        .await?;

    info!(
        run_id = %ctx.run_id,
        file_name = %upload.file_name,
        upload_bytes = upload.size(),
        text_bytes = text.len(),
        "ingestion text extracted"
    );
    ctx.extracted_text = Some(text);

    machine
        .extract()
        .map_err(|(_, guard)| map_guard_error("extract", &guard))
}

#[instrument(level = "trace", skip_all, fields(run_id = %ctx.run_id))]
pub async fn segment_text(
    machine: IngestionMachine<(), TextExtracted>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Segmented>, AppError> {
    ctx.checkpoint("segment")?;

    let extracted = ctx.take_extracted_text()?;
    let formatted = segment(&extracted);
    validate_formatted_text(&formatted)?;

    debug!(
        run_id = %ctx.run_id,
        formatted_chars = char_units(&formatted),
        sentences = formatted.lines().count(),
        "ingestion text segmented"
    );
    ctx.formatted_text = Some(formatted);

    machine
        .segment()
        .map_err(|(_, guard)| map_guard_error("segment", &guard))
}

#[instrument(level = "trace", skip_all, fields(run_id = %ctx.run_id))]
pub async fn archive_original(
    machine: IngestionMachine<(), Segmented>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Archived>, AppError> {
    ctx.checkpoint("archive")?;

    let location = archive_location(
        &ctx.pipeline_config.archive_namespace,
        &ctx.owner()?.id,
        &ctx.upload()?.file_name,
    );

    // Registered first so a write that fails half way is still cleaned up.
    ctx.register_compensation(Compensation::DiscardArchive {
        location: location.clone(),
    });
    let upload = ctx.upload()?;
    ctx.bounded(
        "archive",
        None,
        ctx.services.archive_upload(&location, upload),
    )
    .await?;

    debug!(run_id = %ctx.run_id, location = %location, "ingestion upload archived");
    ctx.archive_location = Some(location);

    machine
        .archive()
        .map_err(|(_, guard)| map_guard_error("archive", &guard))
}

#[instrument(level = "trace", skip_all, fields(run_id = %ctx.run_id))]
pub async fn analyze(
    machine: IngestionMachine<(), Archived>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Analyzed>, AppError> {
    ctx.checkpoint("analyze")?;

    let limit = ctx.pipeline_config.tuning.analysis_timeout;
    let formatted = ctx.formatted_text()?;
    let body = ctx
        .bounded("analyze", Some(limit), ctx.services.analyze(formatted))
        .await?;

    debug!(run_id = %ctx.run_id, body_bytes = body.len(), "ingestion analysis received");
    ctx.raw_analysis = Some(body);

    machine
        .analyze()
        .map_err(|(_, guard)| map_guard_error("analyze", &guard))
}

#[instrument(level = "trace", skip_all, fields(run_id = %ctx.run_id))]
pub async fn parse_analysis(
    machine: IngestionMachine<(), Analyzed>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Parsed>, AppError> {
    ctx.checkpoint("parse")?;

    let body = ctx.take_raw_analysis()?;
    let analysis = parse_analysis_response(&body)?;

    debug!(
        run_id = %ctx.run_id,
        overall = %analysis.overall_risk,
        security_percentage = analysis.security_percentage,
        findings = analysis.findings.as_ref().map_or(0, Vec::len),
        "ingestion analysis parsed"
    );
    ctx.analysis = Some(analysis);

    machine
        .parse()
        .map_err(|(_, guard)| map_guard_error("parse", &guard))
}

#[instrument(level = "trace", skip_all, fields(run_id = %ctx.run_id))]
pub async fn persist(
    machine: IngestionMachine<(), Parsed>,
    ctx: &mut PipelineContext<'_>,
) -> Result<(IngestionMachine<(), Persisted>, DocumentRecord), AppError> {
    ctx.checkpoint("persist")?;

    let record = ctx.build_record()?;

    // A create that errors after writing must not leave the record behind.
    ctx.register_compensation(Compensation::DeleteRecord {
        id: record.id.clone(),
    });
    let stored = ctx.services.create_record(record).await?;

    let machine = machine
        .persist()
        .map_err(|(_, guard)| map_guard_error("persist", &guard))?;

    ctx.commit();
    Ok((machine, stored))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid ingestion pipeline transition during {event}: {guard:?}"
    ))
}
