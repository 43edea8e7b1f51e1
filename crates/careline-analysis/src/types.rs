// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the analysis service.

use careline_core::types::{AnalysisContext, TranscriptEntry};
use serde::{Deserialize, Serialize};

/// Request body shared by both analysis endpoints.
#[derive(Debug, Serialize)]
pub struct AnalysisRequest<'a> {
    pub transcript: &'a [TranscriptEntry],
    pub context: &'a AnalysisContext,
}

/// Error envelope returned by the service on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiError,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_core::types::MessageRole;
    use chrono::{TimeZone, Utc};

    #[test]
    fn request_serializes_transcript_in_order() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let transcript = vec![
            TranscriptEntry {
                role: MessageRole::Assistant,
                content: "How are you feeling today?".into(),
                timestamp: at,
            },
            TranscriptEntry {
                role: MessageRole::Patient,
                content: "A little tired.".into(),
                timestamp: at,
            },
        ];
        let context = AnalysisContext {
            conversation_id: "c-1".into(),
            patient_id: "p-1".into(),
            call_duration_secs: Some(95),
            call_outcome: None,
        };
        let json = serde_json::to_value(AnalysisRequest {
            transcript: &transcript,
            context: &context,
        })
        .unwrap();

        assert_eq!(json["transcript"][0]["role"], "assistant");
        assert_eq!(json["transcript"][1]["content"], "A little tired.");
        assert_eq!(json["context"]["call_duration_secs"], 95);
        assert!(json["context"].get("call_outcome").is_none());
    }

    #[test]
    fn error_envelope_parses() {
        let body = r#"{"error":{"type":"invalid_request","message":"transcript is empty"}}"#;
        let parsed: ApiErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.type_, "invalid_request");
        assert_eq!(parsed.error.message, "transcript is empty");
    }
}
