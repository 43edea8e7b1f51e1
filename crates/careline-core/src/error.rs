// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Careline call session engine.

use thiserror::Error;

use crate::types::CallStatus;

/// The primary error type used across all Careline crates and adapter traits.
#[derive(Debug, Error)]
pub enum CarelineError {
    /// Caller-supplied data failed validation (missing outcome, unknown status string, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested lifecycle transition is not reachable from the current state.
    #[error("invalid transition from `{from}` to `{to}`")]
    InvalidTransition { from: CallStatus, to: CallStatus },

    /// The UDP port is already bound to a different call.
    #[error("port {port} is already bound to call `{call_id}`")]
    PortConflict { port: u16, call_id: String },

    /// The call already owns a listener on another port.
    #[error("call `{call_id}` already has a listener on port {port}")]
    CallAlreadyBound { call_id: String, port: u16 },

    /// OS-level socket bind failure.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        source: std::io::Error,
    },

    /// A referenced record does not exist.
    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },

    /// Call initiation precondition: the patient record does not exist.
    #[error("patient `{patient_id}` not found")]
    PatientNotFound { patient_id: String },

    /// Call initiation precondition: the patient has no phone number on file.
    #[error("patient `{patient_id}` has no phone number")]
    NoPhoneNumber { patient_id: String },

    /// AI analysis provider errors (HTTP failure, malformed response, rejected request).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The provider understood the request and refused it (4xx, undecodable body).
    /// Retrying the same request will not help.
    #[error("provider rejected request: {message}")]
    ProviderRejected { status: Option<u16>, message: String },

    /// Telephony gateway errors (call placement rejected, transport failure).
    #[error("telephony error: {message}")]
    Telephony {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Configuration errors detected at runtime.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CarelineError {
    /// Shorthand for a [`CarelineError::NotFound`] error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether a retry of the same request could plausibly succeed.
    ///
    /// Only provider failures and timeouts qualify; validation, conflict and
    /// lookup errors are deterministic.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Timeout { .. })
    }
}
