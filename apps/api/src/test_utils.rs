//! Shared fixtures for handler and pipeline tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use docx_rs::{Docx, Paragraph, Run};

use crate::config::Config;
use crate::errors::AppError;
use crate::formatting::{FormattedTranscript, TranscriptFormatter};
use crate::state::AppState;
use crate::transcripts::downloads::DownloadStore;
use crate::transcripts::workspace::WORKSPACE_PREFIX;

const BOUNDARY: &str = "transcript-test-boundary";

/// Returns the transcript unchanged.
#[derive(Default)]
pub struct EchoFormatter {
    pub calls: AtomicUsize,
}

#[async_trait]
impl TranscriptFormatter for EchoFormatter {
    async fn format(&self, transcript: &str) -> Result<FormattedTranscript, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FormattedTranscript {
            text: transcript.to_string(),
            truncated: false,
        })
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

/// Fails like an unreachable AI service.
#[derive(Default)]
pub struct FailingFormatter {
    pub calls: AtomicUsize,
}

#[async_trait]
impl TranscriptFormatter for FailingFormatter {
    async fn format(&self, _transcript: &str) -> Result<FormattedTranscript, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AppError::ExternalService("request timed out after 110s".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

pub fn test_state(scratch: &Path, formatter: Arc<dyn TranscriptFormatter>) -> AppState {
    test_state_with(scratch, formatter, &[])
}

pub fn test_state_with(
    scratch: &Path,
    formatter: Arc<dyn TranscriptFormatter>,
    overrides: &[(&str, &str)],
) -> AppState {
    state_from(test_config(scratch, overrides), formatter)
}

/// Config rooted at `scratch`, with a fake API key and fixed signing secret.
pub fn test_config(scratch: &Path, overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("ANTHROPIC_API_KEY".to_string(), "sk-test".to_string()),
        ("SESSION_SECRET".to_string(), "test-secret".to_string()),
        ("SCRATCH_DIR".to_string(), scratch.display().to_string()),
    ]);
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn state_from(config: Config, formatter: Arc<dyn TranscriptFormatter>) -> AppState {
    let downloads =
        DownloadStore::new(&config.scratch_dir, config.download_ttl, &config.session_secret).unwrap();

    AppState {
        config,
        formatter,
        downloads,
    }
}

/// Builds a multipart POST carrying `bytes` as the `file` field.
pub fn multipart_request(uri: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Request workspaces still present under `scratch`.
pub fn workspace_count(scratch: &Path) -> usize {
    std::fs::read_dir(scratch)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(WORKSPACE_PREFIX))
        .count()
}

pub fn docx_fixture(paragraphs: &[&str]) -> Vec<u8> {
    let docx = paragraphs.iter().fold(Docx::new(), |d, p| {
        d.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*p)))
    });
    let mut buf = Cursor::new(Vec::new());
    docx.build().pack(&mut buf).unwrap();
    buf.into_inner()
}
