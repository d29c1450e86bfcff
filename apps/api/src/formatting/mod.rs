//! Transcript formatting: a pluggable, trait-based formatter that turns raw
//! transcript text into the marked-up text the renderer understands.
//!
//! Default: `ClaudeFormatter` (Anthropic Messages API via `LlmClient`).
//! `AppState` holds an `Arc<dyn TranscriptFormatter>` so tests can swap in stubs.

pub mod prompts;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::formatting::prompts::{FORMAT_PROMPT, FORMAT_SYSTEM};
use crate::llm_client::{LlmClient, LlmError};

/// Wrapper lines models like to put above the actual transcript.
const PREAMBLE_MARKERS: &[&str] = &[
    "here's the formatted transcript",
    "here is the formatted transcript",
    "formatted transcript:",
];

/// Marked-up text produced by a formatter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedTranscript {
    pub text: String,
    /// The backend stopped at its output limit; `text` is missing its tail.
    pub truncated: bool,
}

/// Implement this to swap formatting backends without touching the handlers.
#[async_trait]
pub trait TranscriptFormatter: Send + Sync {
    /// Restructures `transcript` into marked-up text. Failures of the
    /// underlying service surface as `AppError::ExternalService`.
    async fn format(&self, transcript: &str) -> Result<FormattedTranscript, AppError>;

    /// Short backend name for logs and responses.
    fn name(&self) -> &'static str;
}

pub struct ClaudeFormatter {
    llm: LlmClient,
}

impl ClaudeFormatter {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl TranscriptFormatter for ClaudeFormatter {
    async fn format(&self, transcript: &str) -> Result<FormattedTranscript, AppError> {
        if transcript.trim().is_empty() {
            return Err(AppError::Validation(
                "Transcript text cannot be empty".to_string(),
            ));
        }

        let prompt = FORMAT_PROMPT.replace("{transcript}", transcript);
        info!("Sending {} characters to Claude", transcript.chars().count());

        let response = self
            .llm
            .call(&prompt, FORMAT_SYSTEM)
            .await
            .map_err(|e| AppError::ExternalService(e.to_string()))?;

        let truncated = response.truncated();
        if truncated {
            warn!(
                "Claude stopped at max_tokens after {} output tokens; document will be incomplete",
                response.usage.output_tokens
            );
        }

        let text = response
            .text()
            .ok_or_else(|| AppError::ExternalService(LlmError::EmptyContent.to_string()))?;

        Ok(FormattedTranscript {
            text: strip_preamble(&text),
            truncated,
        })
    }

    fn name(&self) -> &'static str {
        "claude"
    }
}

/// Drops leading chatter ("Here's the formatted transcript:") and divider
/// lines the model sometimes emits before the transcript itself.
pub fn strip_preamble(text: &str) -> String {
    let mut lines: Vec<&str> = text.trim().lines().collect();

    while let Some(first) = lines.first() {
        let lowered = first.trim().to_lowercase();
        let is_divider = !lowered.is_empty() && lowered.chars().all(|c| matches!(c, '-' | '_'));
        let is_preamble = PREAMBLE_MARKERS.iter().any(|m| lowered.contains(m));
        if lowered.is_empty() || is_divider || is_preamble {
            lines.remove(0);
        } else {
            break;
        }
    }

    lines.join("\n").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmSettings;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn formatter_for(server: &MockServer) -> ClaudeFormatter {
        formatter_with_timeout(server, Duration::from_secs(5))
    }

    fn formatter_with_timeout(server: &MockServer, timeout: Duration) -> ClaudeFormatter {
        let llm = LlmClient::new(LlmSettings {
            api_key: "sk-test".to_string(),
            base_url: server.uri(),
            timeout,
            max_attempts: 1,
            temperature: 0.1,
            deadline: Duration::from_secs(10),
        })
        .unwrap();
        ClaudeFormatter::new(llm)
    }

    #[test]
    fn test_strip_preamble() {
        let input = "Here's the formatted transcript:\n---\n\n**Title**\n\nBody";
        assert_eq!(strip_preamble(input), "**Title**\n\nBody");
    }

    #[test]
    fn test_strip_preamble_leaves_clean_text() {
        let input = "**Billy:** Hello there.";
        assert_eq!(strip_preamble(input), input);
    }

    #[tokio::test]
    async fn test_empty_transcript_is_rejected_without_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = formatter_for(&server).format("   \n").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_formats_via_claude() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "system": FORMAT_SYSTEM,
                "messages": [{"role": "user", "content": "Please format this transcript:\n\nhello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "Here is the formatted transcript:\n**Speaker:** Hello."}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 10, "output_tokens": 5}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let formatted = formatter_for(&server).format("hello").await.unwrap();
        assert_eq!(formatted.text, "**Speaker:** Hello.");
        assert!(!formatted.truncated);
    }

    #[tokio::test]
    async fn test_max_tokens_reply_is_marked_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "**Pastor:** And the third point is"}],
                "stop_reason": "max_tokens",
                "usage": {"input_tokens": 90000, "output_tokens": 16384}
            })))
            .mount(&server)
            .await;

        let formatted = formatter_for(&server).format("a very long sermon").await.unwrap();
        assert!(formatted.truncated);
        assert_eq!(formatted.text, "**Pastor:** And the third point is");
    }

    #[tokio::test]
    async fn test_timeout_is_external_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "content": [{"type": "text", "text": "late"}],
                        "stop_reason": "end_turn",
                        "usage": {"input_tokens": 1, "output_tokens": 1}
                    }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let err = formatter_with_timeout(&server, Duration::from_millis(200))
            .format("hello")
            .await
            .unwrap_err();
        match err {
            AppError::ExternalService(msg) => assert!(msg.contains("request timed out")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_api_failure_is_external_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"type": "authentication_error", "message": "invalid x-api-key"}
            })))
            .mount(&server)
            .await;

        let err = formatter_for(&server).format("hello").await.unwrap_err();
        match err {
            AppError::ExternalService(msg) => assert!(msg.contains("invalid x-api-key")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
