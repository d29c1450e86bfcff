pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::transcripts::handlers;
use crate::transcripts::upload::MULTIPART_OVERHEAD;

/// The router wrapped in the HTTP layers the server runs with.
pub fn build_app(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout;
    build_router(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/transcripts", post(handlers::handle_format))
        .route("/api/v1/uploads", post(handlers::handle_upload))
        .route("/api/v1/downloads/:id", get(handlers::handle_download))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatting::ClaudeFormatter;
    use crate::llm_client::{LlmClient, LlmSettings};
    use crate::test_utils::{
        body_bytes, multipart_request, state_from, test_config, test_state, workspace_count,
        EchoFormatter,
    };
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_health() {
        let scratch = tempfile::tempdir().unwrap();
        let app = build_router(test_state(scratch.path(), Arc::new(EchoFormatter::default())));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "transcript-formatter");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_unknown_download_is_not_found() {
        let scratch = tempfile::tempdir().unwrap();
        let state = test_state(scratch.path(), Arc::new(EchoFormatter::default()));
        let id = uuid::Uuid::new_v4();
        let sig = state.downloads.sign(id).unwrap();
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/downloads/{id}?sig={sig}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_slow_ai_service_is_bad_gateway_before_request_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "content": [{"type": "text", "text": "late"}],
                        "stop_reason": "end_turn",
                        "usage": {"input_tokens": 1, "output_tokens": 1}
                    }))
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        // Same shape as the defaults: two attempts cannot fit in the request timeout.
        let scratch = tempfile::tempdir().unwrap();
        let base_url = server.uri();
        let config = test_config(
            scratch.path(),
            &[
                ("ANTHROPIC_BASE_URL", base_url.as_str()),
                ("LLM_TIMEOUT_SECS", "2"),
                ("LLM_MAX_ATTEMPTS", "2"),
                ("REQUEST_TIMEOUT_SECS", "3"),
            ],
        );
        let llm = LlmClient::new(LlmSettings::from_config(&config)).unwrap();
        let app = build_app(state_from(config, Arc::new(ClaudeFormatter::new(llm))));

        let response = app
            .oneshot(multipart_request("/api/v1/transcripts", "sample.txt", b"hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["error"]["code"], "EXTERNAL_SERVICE_ERROR");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("request timed out"));
        assert_eq!(workspace_count(scratch.path()), 0);
    }
}
