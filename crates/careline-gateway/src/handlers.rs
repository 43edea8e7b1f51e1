// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request handlers for the call, listener and phrase APIs.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use careline_calls::UtteranceOutcome;
use careline_core::CarelineError;
use careline_core::types::{
    CallHistory, CallOutcome, CallStatus, Conversation, EmergencyPhrase, Message, MessageRole,
};
use careline_emergency::{DetectionResult, PhraseMatch};
use careline_rtp::{HealthReport, ListenerSnapshot};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::GatewayState;

type ApiResult<T> = Result<T, ApiError>;

/// Parse an optional wire string into an enum, naming the field on failure.
fn parse_opt<T: FromStr>(field: &str, value: Option<&str>) -> Result<Option<T>, CarelineError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| CarelineError::Validation(format!("unknown {field} `{v}`"))),
    }
}

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_listeners: usize,
}

/// `GET /health` (unauthenticated).
pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        active_listeners: state.engine.listeners().len(),
    })
}

/// `GET /metrics` (unauthenticated). 404 when metrics are disabled.
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics not enabled").into_response(),
    }
}

// --- Calls ---

#[derive(Debug, Deserialize)]
pub struct InitiateCallRequest {
    pub patient_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// `POST /v1/calls`
pub async fn post_call(
    State(state): State<GatewayState>,
    Json(req): Json<InitiateCallRequest>,
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    if req.patient_id.trim().is_empty() || req.agent_id.trim().is_empty() {
        return Err(CarelineError::Validation("patient_id and agent_id are required".into()).into());
    }
    let call = state
        .engine
        .initiate(&req.patient_id, &req.agent_id, req.notes)
        .await?;
    Ok((StatusCode::CREATED, Json(call)))
}

/// `GET /v1/calls/{id}`; `id` may be a conversation id or a gateway call sid.
pub async fn get_call(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Conversation>> {
    Ok(Json(state.engine.get_call(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// `POST /v1/calls/{id}/status`
pub async fn post_call_status(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<Conversation>> {
    let status = parse_opt::<CallStatus>("status", Some(req.status.as_str()))?
        .ok_or_else(|| CarelineError::Validation("status is required".into()))?;
    let outcome = parse_opt::<CallOutcome>("outcome", req.outcome.as_deref())?;
    let call = state
        .engine
        .apply_status(&id, status, outcome, req.notes.as_deref())
        .await?;
    Ok(Json(call))
}

#[derive(Debug, Default, Deserialize)]
pub struct EndCallRequest {
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// `POST /v1/calls/{id}/end`
pub async fn post_call_end(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(req): Json<EndCallRequest>,
) -> ApiResult<Json<Conversation>> {
    let outcome = parse_opt::<CallOutcome>("outcome", req.outcome.as_deref())?;
    let call = state.engine.end(&id, outcome, req.notes.as_deref()).await?;
    Ok(Json(call))
}

#[derive(Debug, Deserialize)]
pub struct UtteranceRequest {
    pub role: String,
    pub text: String,
}

/// `POST /v1/calls/{id}/utterances`
pub async fn post_utterance(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(req): Json<UtteranceRequest>,
) -> ApiResult<(StatusCode, Json<UtteranceOutcome>)> {
    let role = parse_opt::<MessageRole>("role", Some(req.role.as_str()))?
        .ok_or_else(|| CarelineError::Validation("role is required".into()))?;
    let outcome = state.engine.record_utterance(&id, role, &req.text).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

/// `GET /v1/calls/{id}/messages`
pub async fn get_messages(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessagesResponse>> {
    let messages = state.engine.transcript(&id).await?;
    Ok(Json(MessagesResponse { messages }))
}

/// `GET /v1/patients/{id}/calls`
pub async fn get_patient_calls(
    State(state): State<GatewayState>,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<CallHistory>> {
    Ok(Json(state.engine.call_history(&patient_id).await?))
}

// --- Listeners ---

#[derive(Debug, Serialize)]
pub struct ListenersResponse {
    pub listeners: Vec<ListenerSnapshot>,
}

/// `GET /v1/listeners`
pub async fn get_listeners(State(state): State<GatewayState>) -> Json<ListenersResponse> {
    Json(ListenersResponse {
        listeners: state.engine.listeners().list(),
    })
}

/// `GET /v1/listeners/health`
pub async fn get_listener_health(State(state): State<GatewayState>) -> Json<HealthReport> {
    Json(state.engine.listeners().health_check())
}

/// `GET /v1/listeners/{port}`
pub async fn get_listener(
    State(state): State<GatewayState>,
    Path(port): Path<u16>,
) -> ApiResult<Json<ListenerSnapshot>> {
    state
        .engine
        .listeners()
        .status(port)
        .map(Json)
        .ok_or_else(|| CarelineError::not_found("listener", port.to_string()).into())
}

// --- Emergency phrases ---

#[derive(Debug, Serialize)]
pub struct PhrasesResponse {
    pub version: u64,
    pub phrases: Vec<EmergencyPhrase>,
}

/// `GET /v1/emergency/phrases`
pub async fn get_phrases(State(state): State<GatewayState>) -> Json<PhrasesResponse> {
    let snapshot = state.registry.snapshot();
    Json(PhrasesResponse {
        version: snapshot.version,
        phrases: snapshot.phrases.as_ref().clone(),
    })
}

/// Body of `PUT /v1/emergency/phrases/{id}`; the id comes from the path.
#[derive(Debug, Deserialize)]
pub struct PhraseBody {
    pub phrase: String,
    pub language: String,
    pub severity: String,
    pub category: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// `PUT /v1/emergency/phrases/{id}`
pub async fn put_phrase(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<PhraseBody>,
) -> ApiResult<Json<EmergencyPhrase>> {
    let severity = parse_opt("severity", Some(body.severity.as_str()))?
        .ok_or_else(|| CarelineError::Validation("severity is required".into()))?;
    let phrase = EmergencyPhrase {
        id,
        phrase: body.phrase,
        language: body.language,
        severity,
        category: body.category,
        pattern: body.pattern,
        active: body.active,
    };
    Ok(Json(state.registry.upsert(phrase).await?))
}

/// `DELETE /v1/emergency/phrases/{id}`
pub async fn delete_phrase(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.registry.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CarelineError::not_found("emergency phrase", id).into())
    }
}

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub text: String,
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub detection: DetectionResult,
    pub matches: Vec<PhraseMatch>,
}

/// `POST /v1/emergency/matches`: dry-run detection against the live phrase set.
pub async fn post_matches(
    State(state): State<GatewayState>,
    Json(req): Json<MatchRequest>,
) -> Json<MatchResponse> {
    let detector = state.engine.detector();
    Json(MatchResponse {
        detection: detector.detect(&req.text, &req.language),
        matches: detector.get_all_matches(&req.text, &req.language),
    })
}
