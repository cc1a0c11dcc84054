// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! HTTP/WebSocket surface for the interview simulation backend.
//!
//! [`serve`] assembles every process-wide singleton (session registry,
//! rate governor, speech tracker, event bus, external-collaborator
//! stand-ins), mounts the route tables, and blocks on the Axum server —
//! the same "assemble subsystems, then block on serve" shape, minus the
//! pairing/P2P/Slack transport machinery this backend has no use for.

use std::sync::Arc;
use std::time::Instant;

use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use interview_config::Config;
use interview_core::{Coach, EventBus, RateGovernor, SessionRegistry, SpeechTaskTracker};

mod error;
mod extract;
mod poll;
mod providers;
mod routes;
mod state;

pub use error::GatewayError;
pub use state::AppState;

/// Construct every process-wide singleton. Split out from [`serve`] so
/// tests can build the same [`AppState`] without opening a socket.
pub fn build_state(config: Arc<Config>) -> AppState {
    let store = interview_core::InMemoryStore::new();
    let registry = SessionRegistry::new(store.clone(), config.session.idle_timeout);
    registry.start_cleanup_task(config.session.idle_sweep_interval);

    let event_bus = Arc::new(EventBus::new());
    let governor = Arc::new(RateGovernor::new(&config.rate_limits));
    let speech = Arc::new(SpeechTaskTracker::new(store.clone(), governor.clone()));
    speech.start_cleanup_task(config.speech.task_sweep_interval, config.speech.task_retention_hours);
    let coach = Arc::new(Coach::new());

    AppState {
        registry,
        store,
        event_bus,
        governor,
        speech,
        coach,
        llm: providers::build_llm_provider(),
        search: providers::build_search_provider(),
        stt: providers::build_stt_provider(),
        tts: providers::build_tts_provider(),
        config: config.clone(),
        started_at: Instant::now(),
    }
}

/// Mount the route tables onto `state` with the standard middleware stack.
pub fn app(state: AppState) -> axum::Router {
    let max_body = state.config.upload.max_file_size_bytes as usize;
    routes::router().with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(RequestBodyLimitLayer::new(max_body)),
    )
}

/// Assemble process state, mount routes, and serve until terminated.
pub async fn serve(config: Arc<Config>) -> anyhow::Result<()> {
    let bind = config.http.bind.clone();
    let state = build_state(config);
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "interview gateway listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing SIGTERM handler");
        sig.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> axum::Router {
        app(build_state(Arc::new(Config::default())))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn metrics_reports_zero_sessions_initially() {
        let response = test_app()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["sessions"]["active"], 0);
    }

    #[tokio::test]
    async fn usage_stats_lists_all_four_providers() {
        let response = test_app()
            .oneshot(Request::builder().uri("/api/speech/usage-stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert!(json.get("assemblyai").is_some());
        assert!(json.get("polly").is_some());
        assert!(json.get("deepgram").is_some());
        assert!(json.get("search").is_some());
    }

    #[tokio::test]
    async fn create_session_then_missing_header_on_start_is_bad_request() {
        let app = test_app();

        let create_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/interview/session")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(create_response.status(), StatusCode::OK);
        let created = body_json(create_response).await;
        assert!(created["session_id"].is_string());

        let missing_header_response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/interview/start")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing_header_response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn full_session_lifecycle_start_message_end() {
        let app = test_app();

        let created = body_json(
            app.clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/interview/session")
                        .header("content-type", "application/json")
                        .body(Body::from(r#"{"job_role":"Backend Engineer"}"#))
                        .unwrap(),
                )
                .await
                .unwrap(),
        )
        .await;
        let session_id = created["session_id"].as_str().unwrap().to_string();

        let start_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/interview/start")
                    .header("X-Session-ID", &session_id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(start_response.status(), StatusCode::OK);

        let message_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/interview/message")
                    .header("X-Session-ID", &session_id)
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":"I'd use a connection pool."}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(message_response.status(), StatusCode::OK);

        let end_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/interview/end")
                    .header("X-Session-ID", &session_id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(end_response.status(), StatusCode::OK);
        let end_json = body_json(end_response).await;
        assert_eq!(end_json["final_summary_status"], "generating");

        let poll_response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/interview/final-summary-status?poll_count=1")
                    .header("X-Session-ID", &session_id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(poll_response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_session_id_on_history_is_not_found() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/interview/history")
                    .header("X-Session-ID", uuid::Uuid::new_v4().to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
