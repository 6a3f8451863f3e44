//! REST surface mirroring the WebSocket checks for one-shot callers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct SentenceCheckRequest {
    pub sentence: String,
    #[serde(default)]
    pub full_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WordCheckRequest {
    pub word: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImproveTextRequest {
    pub text: String,
}

type RestResponse = (StatusCode, Json<serde_json::Value>);

fn ok(value: impl serde::Serialize) -> RestResponse {
    (
        StatusCode::OK,
        Json(serde_json::to_value(value).unwrap_or_default()),
    )
}

fn gateway_error(detail: impl std::fmt::Display) -> RestResponse {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "detail": detail.to_string() })),
    )
}

pub async fn check_sentence(
    State(state): State<AppState>,
    Json(req): Json<SentenceCheckRequest>,
) -> RestResponse {
    match tokio::time::timeout(
        state.checker_timeout,
        state
            .checker
            .check_sentence(&req.sentence, req.full_text.as_deref()),
    )
    .await
    {
        Ok(Ok(feedback)) => ok(feedback),
        Ok(Err(e)) => gateway_error(e),
        Err(_) => gateway_error("sentence check timed out"),
    }
}

pub async fn check_word(
    State(state): State<AppState>,
    Json(req): Json<WordCheckRequest>,
) -> RestResponse {
    match tokio::time::timeout(
        state.checker_timeout,
        state.checker.check_word(&req.word, req.context.as_deref()),
    )
    .await
    {
        Ok(Ok(check)) => ok(check),
        Ok(Err(e)) => gateway_error(e),
        Err(_) => gateway_error("word check timed out"),
    }
}

pub async fn improve_text(
    State(state): State<AppState>,
    Json(req): Json<ImproveTextRequest>,
) -> RestResponse {
    match tokio::time::timeout(state.checker_timeout, state.checker.improve_text(&req.text)).await
    {
        Ok(Ok(report)) => ok(report),
        Ok(Err(e)) => gateway_error(e),
        Err(_) => gateway_error("improvement analysis timed out"),
    }
}

/// Health check HTTP endpoint.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "writing-assistant",
        "connections": state.manager.count(),
    }))
}
