use thiserror::Error;
use tokio::task::JoinError;

/// Coarse classification used by callers to decide how an error is reported.
///
/// `Validation` errors are caused by the caller and are returned before anything
/// is persisted. `Integration` errors come from a collaborator (extraction,
/// archive, analysis service, response parsing) and may have triggered
/// compensation before surfacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Integration,
    Internal,
}

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Content too large: formatted text has {length} characters, maximum allowed is {limit}")]
    ContentTooLarge { length: usize, limit: usize },
    #[error("Authorization error: {0}")]
    Auth(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Extraction error: {0}")]
    Extraction(String),
    #[error("Archive error: {0}")]
    Archive(#[from] object_store::Error),
    #[error("Analysis service error: status {status} - {body}")]
    AnalysisService { status: u16, body: String },
    #[error("Analysis parsing error: {0}")]
    AnalysisParsing(String),
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },
    #[error("Pipeline cancelled before {0}")]
    Cancelled(&'static str),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) | Self::ContentTooLarge { .. } | Self::Auth(_) => {
                ErrorClass::Validation
            }
            Self::UnsupportedFormat(_)
            | Self::Extraction(_)
            | Self::Archive(_)
            | Self::AnalysisService { .. }
            | Self::AnalysisParsing(_)
            | Self::Timeout { .. }
            | Self::Cancelled(_)
            | Self::Reqwest(_) => ErrorClass::Integration,
            Self::Database(_)
            | Self::NotFound(_)
            | Self::Join(_)
            | Self::Io(_)
            | Self::Anyhow(_)
            | Self::InternalError(_) => ErrorClass::Internal,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.class() == ErrorClass::Validation
    }
}
