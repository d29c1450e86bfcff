//! Multipart intake: validates the submitted file and streams it into the
//! request workspace, enforcing the size ceiling chunk by chunk.

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::{header, HeaderMap, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::models::transcript::{TranscriptKind, Upload};
use crate::transcripts::workspace::RequestWorkspace;

pub const FILE_FIELD: &str = "file";
/// Slack on top of the file ceiling for multipart boundaries and part headers.
pub const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Rejects requests whose declared `Content-Length` cannot fit under the
/// ceiling, before any of the body is read.
pub fn check_declared_length(headers: &HeaderMap, limit: u64) -> Result<(), AppError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    match declared {
        Some(len) if len > limit.saturating_add(MULTIPART_OVERHEAD) => {
            info!("Rejecting upload with declared length {len} (limit {limit})");
            Err(AppError::PayloadTooLarge { limit })
        }
        _ => Ok(()),
    }
}

/// Pulls the `file` field out of the form and writes it into `workspace`.
///
/// The extension is checked before any content is read, and reading stops as
/// soon as the running size passes `limit`.
pub async fn receive_upload(
    multipart: &mut Multipart,
    workspace: &RequestWorkspace,
    limit: u64,
) -> Result<Upload, AppError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_filename = field.file_name().unwrap_or_default().trim().to_string();
        if original_filename.is_empty() {
            return Err(AppError::Validation("No file selected".to_string()));
        }

        let kind = TranscriptKind::from_filename(&original_filename)
            .ok_or_else(|| AppError::Validation(unsupported_type_message(&original_filename)))?;
        let content_type = field.content_type().map(str::to_string);
        let sanitized_filename = sanitize_filename(&original_filename, kind);
        let path = workspace.file_path(&sanitized_filename);

        let mut file = tokio::fs::File::create(&path).await?;
        let mut size: u64 = 0;
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
            size += chunk.len() as u64;
            if size > limit {
                info!("Upload '{original_filename}' passed the {limit} byte limit; aborting read");
                return Err(AppError::PayloadTooLarge { limit });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if size == 0 {
            return Err(AppError::Validation("File is empty".to_string()));
        }

        debug!("Stored upload '{original_filename}' ({size} bytes) at {}", path.display());

        return Ok(Upload {
            original_filename,
            sanitized_filename,
            kind,
            content_type,
            size,
            path,
        });
    }

    Err(AppError::Validation("No file provided".to_string()))
}

fn multipart_error(e: MultipartError, limit: u64) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::Validation(format!("Malformed upload: {}", e.body_text()))
    }
}

fn unsupported_type_message(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!(
            "Unsupported file type '.{ext}'. Only .txt and .docx files are supported"
        ),
        _ => "Unsupported file type. Only .txt and .docx files are supported".to_string(),
    }
}

/// Reduces a client filename to a safe ASCII name with the canonical extension.
/// Whitespace becomes `_`, other characters outside `[A-Za-z0-9._-]` are
/// dropped, leading dots are stripped and path components are ignored.
pub fn sanitize_filename(filename: &str, kind: TranscriptKind) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let stem = base.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(base);

    let cleaned: String = stem
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') => Some(c),
            _ => None,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').trim_matches('_');

    let stem = if cleaned.is_empty() { "transcript" } else { cleaned };
    format!("{stem}.{}", kind.extension())
}
