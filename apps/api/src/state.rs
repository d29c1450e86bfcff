use std::sync::Arc;

use crate::config::Config;
use crate::formatting::TranscriptFormatter;
use crate::transcripts::downloads::DownloadStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pluggable formatter. Default: ClaudeFormatter; tests inject stubs.
    pub formatter: Arc<dyn TranscriptFormatter>,
    /// Documents waiting for their one-shot download.
    pub downloads: DownloadStore,
}
