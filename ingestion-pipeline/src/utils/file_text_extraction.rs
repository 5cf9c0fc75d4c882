use std::io::Read;

use common::{
    error::AppError,
    utils::ingest_limits::{truncate_to_byte_limit, MAX_EXTRACTED_TEXT_BYTES},
};
use quick_xml::events::Event;
use tracing::debug;

const MIME_PDF: &str = "application/pdf";
const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Upper bound on the decompressed size of `word/document.xml`.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Guesses the MIME type of an upload from its declared filename.
pub fn detect_mime_type(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_owned()
}

fn is_plain_text(mime: &str) -> bool {
    mime.starts_with("text/") || matches!(mime, "application/json" | "application/xml")
}

/// Extracts plain text from an uploaded document, capped at
/// [`MAX_EXTRACTED_TEXT_BYTES`].
///
/// PDF and DOCX parsing runs on the blocking pool. Dropping the returned
/// future, as a timeout does, does not stop that thread: it runs to the end
/// and its result is discarded.
pub async fn extract_text_from_bytes(bytes: Vec<u8>, file_name: &str) -> Result<String, AppError> {
    let mime = detect_mime_type(file_name);

    let text = match mime.as_str() {
        m if is_plain_text(m) => String::from_utf8_lossy(&bytes).into_owned(),
        MIME_PDF => extract_pdf(bytes).await?,
        MIME_DOCX => tokio::task::spawn_blocking(move || extract_docx(&bytes)).await??,
        other => {
            return Err(AppError::UnsupportedFormat(format!(
                "{file_name} has unsupported type {other}"
            )))
        }
    };

    let extracted_bytes = text.len();
    let text = truncate_to_byte_limit(text, MAX_EXTRACTED_TEXT_BYTES);
    debug!(
        mime = %mime,
        extracted_bytes,
        kept_bytes = text.len(),
        "document text extracted"
    );

    Ok(text)
}

async fn extract_pdf(pdf_bytes: Vec<u8>) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&pdf_bytes))
        .await?
        .map_err(|err| AppError::Extraction(format!("Failed to extract text from PDF: {err}")))
}

fn extract_docx(bytes: &[u8]) -> Result<String, AppError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| AppError::Extraction(format!("Not a valid DOCX archive: {e}")))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| AppError::Extraction(format!("word/document.xml not readable: {e}")))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| AppError::Extraction(e.to_string()))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(AppError::Extraction(
            "word/document.xml exceeds size limit".into(),
        ));
    }

    docx_paragraph_text(&xml)
}

/// Collects `w:t` runs, ending each `w:p` paragraph with a blank line so the
/// segmenter sees the original paragraph structure.
fn docx_paragraph_text(xml: &[u8]) -> Result<String, AppError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| AppError::Extraction(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(AppError::Extraction(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}
