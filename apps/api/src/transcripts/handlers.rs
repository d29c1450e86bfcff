//! Axum route handlers for the transcript API.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::transcript::FormattedDocument;
use crate::state::AppState;
use crate::transcripts::pipeline::process_upload;

const PREVIEW_CHARS: usize = 500;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
    pub formatter: &'static str,
    pub preview: String,
    /// The formatted text stopped short of the end of the transcript.
    pub truncated: bool,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub sig: String,
}

/// POST /api/v1/transcripts
///
/// Multipart upload (`file` field, .txt or .docx). Responds with the formatted
/// Word document as an attachment; `x-transcript-truncated: true` marks a
/// document the AI service cut short.
pub async fn handle_format(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<FormattedDocument, AppError> {
    let conversion = process_upload(&state, &headers, multipart).await?;
    Ok(conversion.document)
}

/// POST /api/v1/uploads
///
/// Same pipeline as `handle_format`, but parks the document and returns a
/// signed one-shot download URL with a short preview of the formatted text.
pub async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let conversion = process_upload(&state, &headers, multipart).await?;
    let preview = preview(&conversion.formatted_text);
    let truncated = conversion.document.truncated;
    let ticket = state.downloads.park(conversion.document).await?;

    Ok(Json(UploadResponse {
        success: true,
        filename: ticket.filename,
        download_url: ticket.download_url,
        expires_at: ticket.expires_at,
        formatter: state.formatter.name(),
        preview,
        truncated,
    }))
}

/// GET /api/v1/downloads/:id?sig=...
///
/// Streams a parked document once, then it is gone.
pub async fn handle_download(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DownloadQuery>,
) -> Result<FormattedDocument, AppError> {
    state.downloads.claim(id, &query.sig).await
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
