// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of [`CarelineError`] onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use careline_core::CarelineError;
use serde::Serialize;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Engine(CarelineError),
    /// Request authenticity could not be established.
    Forbidden(&'static str),
}

impl From<CarelineError> for ApiError {
    fn from(e: CarelineError) -> Self {
        Self::Engine(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Engine(e) => status_for(e),
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Engine(e) => e.fmt(f),
            Self::Forbidden(reason) => f.write_str(reason),
        }
    }
}

/// HTTP status for an engine error.
pub fn status_for(error: &CarelineError) -> StatusCode {
    match error {
        CarelineError::Validation(_)
        | CarelineError::InvalidTransition { .. }
        | CarelineError::NoPhoneNumber { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CarelineError::PortConflict { .. } | CarelineError::CallAlreadyBound { .. } => {
            StatusCode::CONFLICT
        }
        CarelineError::NotFound { .. } | CarelineError::PatientNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        CarelineError::Bind { .. }
        | CarelineError::Telephony { .. }
        | CarelineError::Provider { .. }
        | CarelineError::ProviderRejected { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_core::types::CallStatus;

    #[test]
    fn maps_error_kinds_to_statuses() {
        let cases = [
            (
                CarelineError::Validation("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CarelineError::InvalidTransition {
                    from: CallStatus::Connected,
                    to: CallStatus::Ringing,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CarelineError::NoPhoneNumber {
                    patient_id: "p".into(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CarelineError::PortConflict {
                    port: 1,
                    call_id: "c".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                CarelineError::CallAlreadyBound {
                    call_id: "c".into(),
                    port: 1,
                },
                StatusCode::CONFLICT,
            ),
            (CarelineError::not_found("conversation", "c"), StatusCode::NOT_FOUND),
            (
                CarelineError::PatientNotFound {
                    patient_id: "p".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                CarelineError::Telephony {
                    message: "down".into(),
                    source: None,
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                CarelineError::ProviderRejected {
                    status: Some(400),
                    message: "no".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                CarelineError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(status_for(&error), expected, "{error}");
        }
    }

    #[test]
    fn forbidden_is_403() {
        let err = ApiError::Forbidden("invalid callback signature");
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "invalid callback signature");
    }

    #[test]
    fn error_response_serializes() {
        let resp = ErrorResponse {
            error: "something went wrong".to_string(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"error":"something went wrong"}"#);
    }
}
