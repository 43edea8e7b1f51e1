// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telephony status callback endpoint.
//!
//! The gateway posts a form body per lifecycle event. Out-of-order and
//! duplicate deliveries are expected: a callback that the lifecycle table
//! refuses is acknowledged with 200 so the gateway stops redelivering it.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use careline_core::CarelineError;
use careline_telephony::{SIGNATURE_HEADER, StatusCallback, map_gateway_status, verify_signature};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Acknowledgement body for status callbacks.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_status: Option<String>,
}

impl WebhookAck {
    fn ignored() -> Json<Self> {
        Json(Self {
            status: "ignored",
            call_status: None,
        })
    }
}

/// `POST /v1/telephony/status`
pub async fn post_status_callback(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    match handle(&state, &headers, &body).await {
        Ok(ack) => ack.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle(
    state: &GatewayState,
    headers: &HeaderMap,
    body: &str,
) -> Result<Json<WebhookAck>, ApiError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(body)
        .map_err(|e| CarelineError::Validation(format!("malformed callback body: {e}")))?;

    if state.webhook.validate_signatures {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let valid = state.webhook.auth_token.as_deref().is_some_and(|token| {
            verify_signature(token, &state.webhook.callback_url, &pairs, signature)
        });
        if !valid {
            warn!("status callback rejected: bad signature");
            return Err(ApiError::Forbidden("invalid callback signature"));
        }
    }

    let callback: StatusCallback = serde_urlencoded::from_str(body)
        .map_err(|e| CarelineError::Validation(format!("malformed callback body: {e}")))?;
    debug!(
        call_sid = %callback.call_sid,
        call_status = %callback.call_status,
        "status callback received"
    );

    let Some(change) =
        map_gateway_status(&callback.call_status, callback.answered_by.as_deref())?
    else {
        return Ok(WebhookAck::ignored());
    };

    match state
        .engine
        .apply_status(&callback.call_sid, change.status, change.outcome, None)
        .await
    {
        Ok(call) => {
            if let Some(gateway_secs) = callback.duration_secs() {
                debug!(
                    conversation_id = %call.id,
                    gateway_duration_secs = gateway_secs,
                    duration_secs = call.call_duration_secs,
                    "gateway reported call duration"
                );
            }
            Ok(Json(WebhookAck {
                status: "ok",
                call_status: Some(call.call_status.to_string()),
            }))
        }
        Err(CarelineError::InvalidTransition { from, to }) => {
            info!(
                call_sid = %callback.call_sid,
                %from,
                %to,
                "stale status callback ignored"
            );
            Ok(WebhookAck::ignored())
        }
        Err(e) => Err(e.into()),
    }
}
