use std::path::PathBuf;

use axum::{
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::render::DOCX_CONTENT_TYPE;

/// Set to `true` on document responses whose formatted text was cut short.
pub const TRUNCATED_HEADER: &str = "x-transcript-truncated";

/// Transcript file types the service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptKind {
    PlainText,
    Word,
}

impl TranscriptKind {
    /// Classifies a filename by extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(Self::PlainText),
            "docx" => Some(Self::Word),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::PlainText => "txt",
            Self::Word => "docx",
        }
    }
}

/// One submitted file, already streamed into its request workspace.
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_filename: String,
    pub sanitized_filename: String,
    pub kind: TranscriptKind,
    pub content_type: Option<String>,
    pub size: u64,
    pub path: PathBuf,
}

impl Upload {
    /// Sanitized filename without its extension.
    pub fn stem(&self) -> &str {
        self.sanitized_filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.sanitized_filename)
    }
}

/// Rendered output of a successful conversion.
#[derive(Debug, Clone)]
pub struct FormattedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub truncated: bool,
}

impl IntoResponse for FormattedDocument {
    fn into_response(self) -> Response {
        // Filenames are sanitized to ASCII, so no quoting beyond the wrapper is needed.
        let disposition = format!("attachment; filename=\"{}\"", self.filename);
        let truncated = self.truncated;
        let mut response = (
            [
                (header::CONTENT_TYPE, DOCX_CONTENT_TYPE.to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            self.bytes,
        )
            .into_response();
        if truncated {
            response.headers_mut().insert(
                HeaderName::from_static(TRUNCATED_HEADER),
                HeaderValue::from_static("true"),
            );
        }
        response
    }
}
