use crate::error::AppError;

/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Largest accepted formatted (numbered) text, counted in Unicode scalar values.
pub const MAX_FORMATTED_TEXT_CHARS: usize = 30_000;

/// Cap applied to text returned by the extraction collaborator, in bytes.
pub const MAX_EXTRACTED_TEXT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestValidationError {
    MissingUpload,
    PayloadTooLarge { size: usize, limit: usize },
    ContentTooLarge { length: usize, limit: usize },
}

impl From<IngestValidationError> for AppError {
    fn from(err: IngestValidationError) -> Self {
        match err {
            IngestValidationError::MissingUpload => {
                AppError::Validation("No file was provided".into())
            }
            IngestValidationError::PayloadTooLarge { size, limit } => AppError::Validation(
                format!("Upload of {size} bytes exceeds the maximum of {limit} bytes"),
            ),
            IngestValidationError::ContentTooLarge { length, limit } => {
                AppError::ContentTooLarge { length, limit }
            }
        }
    }
}

/// Checks the raw upload gate: a file must be present and at most
/// [`MAX_UPLOAD_BYTES`] long.
pub fn validate_upload_size(size: Option<usize>) -> Result<(), IngestValidationError> {
    let Some(size) = size else {
        return Err(IngestValidationError::MissingUpload);
    };

    if size > MAX_UPLOAD_BYTES {
        return Err(IngestValidationError::PayloadTooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }

    Ok(())
}

/// Checks the formatted text gate. Length is measured with `str::chars`.
pub fn validate_formatted_text(text: &str) -> Result<(), IngestValidationError> {
    let length = text.chars().count();
    if length > MAX_FORMATTED_TEXT_CHARS {
        return Err(IngestValidationError::ContentTooLarge {
            length,
            limit: MAX_FORMATTED_TEXT_CHARS,
        });
    }

    Ok(())
}

/// Truncates `text` to at most `max_bytes`, backing off to the previous char boundary.
pub fn truncate_to_byte_limit(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }

    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut = cut.saturating_sub(1);
    }
    text.truncate(cut);
    text
}
