// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Speech routes: batch STT submit/poll, streaming STT over WebSocket,
//! buffered and streamed TTS, and the rate-governor usage snapshot.

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use interview_core::{GovernorProvider, InterviewStyle};

use crate::error::GatewayError;
use crate::extract::SessionId;
use crate::state::AppState;

// ── POST /api/speech-to-text ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SttSubmitResponse {
    pub task_id: Uuid,
    pub status: &'static str,
}

pub async fn submit_batch(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
    audio: Bytes,
) -> Result<Json<SttSubmitResponse>, GatewayError> {
    let task_id = state
        .speech
        .submit_batch_stt(&session_id.to_string(), audio.to_vec(), state.stt.clone())
        .await?;
    Ok(Json(SttSubmitResponse { task_id, status: "processing" }))
}

// ── GET /api/speech-to-text/status/{task_id} ───────────────────────────────

pub async fn batch_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<interview_core::SpeechTaskRecord>, GatewayError> {
    state
        .speech
        .poll_task(task_id)
        .await
        .map(Json)
        .ok_or_else(|| GatewayError::BadRequest(format!("unknown speech task: {task_id}")))
}

// ── WS /api/speech-to-text/stream ───────────────────────────────────────────

#[derive(Debug, Serialize)]
struct StreamFrame {
    #[serde(rename = "type")]
    frame_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_final: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    timestamp: chrono::DateTime<Utc>,
}

impl StreamFrame {
    fn new(frame_type: &'static str) -> Self {
        Self { frame_type, text: None, is_final: None, error: None, timestamp: Utc::now() }
    }

    fn transcript(text: String, is_final: bool) -> Self {
        Self { text: Some(text), is_final: Some(is_final), ..Self::new("transcript") }
    }

    fn error(message: String) -> Self {
        Self { error: Some(message), ..Self::new("error") }
    }
}

pub async fn stream_stt(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
) -> Response {
    ws.on_upgrade(move |socket| handle_stream_stt(socket, state, session_id))
}

/// Bridges binary audio chunks from the client to transcripts back out.
/// There is no incremental-decode seam on [`interview_core::SttProvider`]
/// (batch transcription only), so each accumulated buffer is re-submitted
/// whole on every chunk — adequate for the short utterances this protocol
/// is used for, at the cost of redoing work on long streams.
async fn handle_stream_stt(mut socket: WebSocket, state: AppState, session_id: Uuid) {
    send_frame(&mut socket, &StreamFrame::new("connecting")).await;

    let task_id = match state.speech.submit_stream_stt(&session_id.to_string()).await {
        Ok(id) => id,
        Err(err) => {
            send_frame(&mut socket, &StreamFrame::error(err.to_string())).await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    // Hold a governor slot for the life of the stream, not just the
    // initial availability check `submit_stream_stt` performed.
    let _guard = state.governor.acquire(GovernorProvider::SttStream).await;

    send_frame(&mut socket, &StreamFrame::new("connected")).await;

    let mut buffer: Vec<u8> = Vec::new();
    let mut last_transcript = String::new();

    loop {
        match socket.recv().await {
            Some(Ok(Message::Binary(chunk))) => {
                buffer.extend_from_slice(&chunk);
                match state.stt.transcribe(&buffer).await {
                    Ok(text) => {
                        last_transcript = text.clone();
                        state.speech.push_stream_chunk(task_id, &text, false).await;
                        send_frame(&mut socket, &StreamFrame::transcript(text, false)).await;
                    }
                    Err(err) => {
                        send_frame(&mut socket, &StreamFrame::error(err.to_string())).await;
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(_)) => break,
        }
    }

    state.speech.push_stream_chunk(task_id, &last_transcript, true).await;
    send_frame(&mut socket, &StreamFrame::new("utterance_end")).await;
    send_frame(&mut socket, &StreamFrame::new("disconnected")).await;
}

async fn send_frame(socket: &mut WebSocket, frame: &StreamFrame) {
    if let Ok(json) = serde_json::to_string(frame) {
        let _ = socket.send(Message::Text(json)).await;
    }
}

// ── POST /api/text-to-speech ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    #[serde(default)]
    pub style: Option<String>,
}

fn parse_style(style: &Option<String>) -> InterviewStyle {
    style
        .as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

pub async fn synthesize(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
    Json(req): Json<TtsRequest>,
) -> Result<Response, GatewayError> {
    let style = parse_style(&req.style);
    let (_task_id, bytes) = state
        .speech
        .submit_tts(&session_id.to_string(), &req.text, style, state.tts.clone())
        .await?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "audio/mpeg")], bytes.as_ref().clone()).into_response())
}

// ── POST /api/text-to-speech/stream ─────────────────────────────────────────

const STREAM_CHUNK_SIZE: usize = 4096;

pub async fn synthesize_stream(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
    Json(req): Json<TtsRequest>,
) -> Result<Response, GatewayError> {
    let style = parse_style(&req.style);
    let (_task_id, bytes) = state
        .speech
        .submit_tts(&session_id.to_string(), &req.text, style, state.tts.clone())
        .await?;

    // `TtsProvider::synthesize` returns the whole buffer at once; chunking
    // it here gives the client a streamed response shape without a true
    // incrementally-synthesizing provider underneath.
    let chunks: Vec<Result<Vec<u8>, std::convert::Infallible>> =
        bytes.chunks(STREAM_CHUNK_SIZE).map(|c| Ok(c.to_vec())).collect();
    let body = axum::body::Body::from_stream(futures::stream::iter(chunks));

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "audio/mpeg")], body).into_response())
}

// ── GET /api/speech/usage-stats ─────────────────────────────────────────────

pub async fn usage_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!(state.governor.all_stats()))
}
