//! Conversion pipeline: upload → workspace → extraction → formatter → renderer.
//!
//! Each call owns one `RequestWorkspace`; it is closed explicitly once the
//! pipeline settles and dropped (and therefore removed) on any early exit.

use axum::extract::Multipart;
use axum::http::HeaderMap;
use chrono::Utc;
use tracing::info;

use crate::errors::AppError;
use crate::formatting::TranscriptFormatter;
use crate::models::transcript::{FormattedDocument, Upload};
use crate::render::{render_transcript, title_from_stem};
use crate::state::AppState;
use crate::transcripts::extract::extract_text;
use crate::transcripts::upload::{check_declared_length, receive_upload};
use crate::transcripts::workspace::RequestWorkspace;

/// Output of a successful run: the document plus the formatter's text.
#[derive(Debug)]
pub struct Conversion {
    pub document: FormattedDocument,
    pub formatted_text: String,
}

/// Runs a multipart request through the whole pipeline.
pub async fn process_upload(
    state: &AppState,
    headers: &HeaderMap,
    mut multipart: Multipart,
) -> Result<Conversion, AppError> {
    let limit = state.config.max_upload_bytes;
    check_declared_length(headers, limit)?;

    let workspace = RequestWorkspace::create_in(&state.config.scratch_dir)?;

    let result = async {
        let upload = receive_upload(&mut multipart, &workspace, limit).await?;
        convert_upload(&upload, state.formatter.as_ref()).await
    }
    .await;

    workspace.close();
    result
}

/// Extracts, formats and renders one stored upload.
pub async fn convert_upload(
    upload: &Upload,
    formatter: &dyn TranscriptFormatter,
) -> Result<Conversion, AppError> {
    info!(
        "Processing '{}' ({:?}, {} bytes, content type {})",
        upload.original_filename,
        upload.kind,
        upload.size,
        upload.content_type.as_deref().unwrap_or("unknown")
    );

    let raw = tokio::fs::read(&upload.path).await?;
    let text = extract_text(upload.kind, &raw)?;
    if text.trim().is_empty() {
        return Err(AppError::Validation("File is empty".to_string()));
    }

    let formatted = formatter.format(&text).await?;
    info!(
        "Formatter '{}' returned {} characters{}",
        formatter.name(),
        formatted.text.chars().count(),
        if formatted.truncated { " (truncated)" } else { "" }
    );
    let formatted_text = formatted.text;

    let bytes = render_transcript(&formatted_text, &title_from_stem(upload.stem()))?;

    Ok(Conversion {
        document: FormattedDocument {
            filename: format!("{}_formatted.docx", upload.stem()),
            bytes,
            created_at: Utc::now(),
            truncated: formatted.truncated,
        },
        formatted_text,
    })
}
