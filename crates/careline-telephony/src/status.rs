// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway status callbacks and their mapping onto call lifecycle changes.

use careline_core::CarelineError;
use careline_core::types::{CallOutcome, CallStatus};
use serde::Deserialize;

/// Form body of a status callback. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusCallback {
    pub call_sid: String,
    pub call_status: String,
    #[serde(default)]
    pub answered_by: Option<String>,
    #[serde(default)]
    pub call_duration: Option<String>,
}

impl StatusCallback {
    /// Gateway-reported call length in seconds, when present and numeric.
    pub fn duration_secs(&self) -> Option<i64> {
        self.call_duration.as_deref()?.trim().parse().ok()
    }
}

/// Lifecycle change a callback asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: CallStatus,
    pub outcome: Option<CallOutcome>,
}

impl StatusChange {
    fn to(status: CallStatus) -> Self {
        Self {
            status,
            outcome: None,
        }
    }

    fn end(outcome: CallOutcome) -> Self {
        Self {
            status: CallStatus::Ended,
            outcome: Some(outcome),
        }
    }
}

/// Map a gateway call status onto a lifecycle change.
///
/// `queued` and `initiated` carry no information beyond what call
/// placement already recorded and map to `None`. Unknown statuses are a
/// validation error.
pub fn map_gateway_status(
    call_status: &str,
    answered_by: Option<&str>,
) -> Result<Option<StatusChange>, CarelineError> {
    let change = match call_status.trim().to_ascii_lowercase().as_str() {
        "queued" | "initiated" => return Ok(None),
        "ringing" => StatusChange::to(CallStatus::Ringing),
        "in-progress" | "answered" => {
            if answered_by.is_some_and(is_machine) {
                StatusChange::to(CallStatus::Answered)
            } else {
                StatusChange::to(CallStatus::Connected)
            }
        }
        "completed" => StatusChange::end(CallOutcome::Answered),
        "busy" => StatusChange::end(CallOutcome::Busy),
        "no-answer" => StatusChange::end(CallOutcome::NoAnswer),
        "canceled" | "cancelled" => StatusChange::end(CallOutcome::Cancelled),
        "failed" => StatusChange {
            status: CallStatus::Failed,
            outcome: Some(CallOutcome::Failed),
        },
        other => {
            return Err(CarelineError::Validation(format!(
                "unknown gateway call status `{other}`"
            )));
        }
    };
    Ok(Some(change))
}

fn is_machine(answered_by: &str) -> bool {
    let answered_by = answered_by.to_ascii_lowercase();
    answered_by.starts_with("machine") || answered_by == "fax"
}
