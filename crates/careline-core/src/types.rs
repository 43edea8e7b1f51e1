// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the call session engine and its adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of external collaborator an adapter talks to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Telephony,
    Analysis,
    Alerting,
    Transcription,
    Storage,
    Directory,
    Observability,
}

// --- Call lifecycle ---

/// Lifecycle state of a single phone call.
///
/// Success path: `initiated -> ringing -> answered -> connected -> ended -> completed`.
/// `failed` is reachable from the pre-connection states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Initiated,
    Ringing,
    Answered,
    Connected,
    Ended,
    Completed,
    Failed,
}

impl CallStatus {
    /// Whether the call itself is over (ended, completed or failed).
    ///
    /// Lifecycle facts (end time, duration, outcome) are frozen once this is true.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Ended | Self::Completed | Self::Failed)
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Recorded result of a call, consumed by the external scheduler.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum CallOutcome {
    Answered,
    NoAnswer,
    Busy,
    Voicemail,
    Failed,
    #[strum(to_string = "cancelled", serialize = "canceled")]
    #[serde(alias = "canceled")]
    Cancelled,
}

/// Overall status of a conversation record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ConversationStatus {
    Initiated,
    InProgress,
    Completed,
    Failed,
}

/// Speaker of a single utterance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Patient,
    Assistant,
    System,
}

/// One utterance in a conversation transcript. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message stamped with the current time.
    pub fn new(conversation_id: &str, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The lifecycle record for one phone interaction with a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub patient_id: String,
    /// Caregiver or automated initiator.
    pub agent_id: String,
    /// Correlation id returned by the telephony gateway.
    pub call_sid: Option<String>,
    pub call_status: CallStatus,
    pub call_start_time: DateTime<Utc>,
    pub call_end_time: Option<DateTime<Utc>>,
    /// Whole seconds between start and end, clamped to zero. Set once, with `call_end_time`.
    pub call_duration_secs: Option<i64>,
    pub call_outcome: Option<CallOutcome>,
    pub call_notes: Option<String>,
    /// Message ids in transcript order.
    pub message_ids: Vec<String>,
    pub analyzed_data: AnalyzedData,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a fresh conversation in the `initiated` state.
    pub fn new(patient_id: &str, agent_id: &str, notes: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient_id.to_string(),
            agent_id: agent_id.to_string(),
            call_sid: None,
            call_status: CallStatus::Initiated,
            call_start_time: now,
            call_end_time: None,
            call_duration_secs: None,
            call_outcome: None,
            call_notes: notes.filter(|n| !n.trim().is_empty()),
            message_ids: Vec::new(),
            analyzed_data: AnalyzedData::default(),
            status: ConversationStatus::Initiated,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append caller-supplied notes, keeping earlier notes.
    pub fn append_notes(&mut self, notes: Option<&str>) {
        let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) else {
            return;
        };
        self.call_notes = Some(match self.call_notes.take() {
            Some(existing) => format!("{existing}\n{notes}"),
            None => notes.to_string(),
        });
    }

    /// Condensed view for the scheduler's call history.
    pub fn summary(&self) -> CallSummary {
        CallSummary {
            conversation_id: self.id.clone(),
            call_sid: self.call_sid.clone(),
            call_status: self.call_status,
            status: self.status,
            outcome: self.call_outcome,
            started_at: self.call_start_time,
            ended_at: self.call_end_time,
            duration_secs: self.call_duration_secs,
        }
    }
}

// --- Post-call analysis ---

/// Enrichment results written by finalization. Both fields may stay absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_abuse: Option<FraudAbuseAnalysis>,
}

impl AnalyzedData {
    pub fn is_empty(&self) -> bool {
        self.sentiment.is_none() && self.fraud_abuse.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConcernLevel {
    Low,
    Medium,
    High,
}

/// Structured sentiment assessment of a call transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentAnalysis {
    pub overall_sentiment: SentimentLabel,
    /// -1.0 (very negative) to 1.0 (very positive).
    pub sentiment_score: f64,
    pub confidence: f64,
    #[serde(default)]
    pub key_emotions: Vec<String>,
    pub concern_level: ConcernLevel,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// Structured fraud/abuse risk assessment of a call transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAbuseAnalysis {
    pub risk_level: RiskLevel,
    /// 0.0 to 1.0.
    pub risk_score: f64,
    pub confidence: f64,
    #[serde(default)]
    pub indicators: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// A single enrichment result to write into `analyzed_data`.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisRecord {
    Sentiment(SentimentAnalysis),
    FraudAbuse(FraudAbuseAnalysis),
}

impl AnalysisRecord {
    /// Apply this result to the matching `analyzed_data` field.
    pub fn apply_to(self, data: &mut AnalyzedData) {
        match self {
            AnalysisRecord::Sentiment(s) => data.sentiment = Some(s),
            AnalysisRecord::FraudAbuse(f) => data.fraud_abuse = Some(f),
        }
    }
}

/// One line of the transcript sent to the analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Message> for TranscriptEntry {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role,
            content: m.content.clone(),
            timestamp: m.timestamp,
        }
    }
}

/// Optional context sent alongside a transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub conversation_id: String,
    pub patient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_duration_secs: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_outcome: Option<CallOutcome>,
}

// --- Patients and scheduling ---

/// Read-only view of a patient record owned by the record-management system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub organization_id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    /// Language tag used for emergency phrase matching (e.g. `en`, `es`).
    pub preferred_language: String,
}

/// Organization re-dial policy. The core only exposes it; it never re-dials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_interval_mins: u32,
}

/// Per-call facts the external scheduler reads to decide re-dial cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    pub conversation_id: String,
    pub call_sid: Option<String>,
    pub call_status: CallStatus,
    pub status: ConversationStatus,
    pub outcome: Option<CallOutcome>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
}

/// A patient's call history plus the retry policy that applies to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallHistory {
    pub patient_id: String,
    pub calls: Vec<CallSummary>,
    pub retry_policy: RetryPolicy,
}

// --- Emergencies ---

/// Ordered emergency severity: `low < medium < high < critical`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Administrator-managed emergency phrase registry entry.
///
/// `pattern` is a regular expression fragment; when absent the phrase text
/// itself is matched literally. Matching is always case-insensitive and
/// anchored on word boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyPhrase {
    pub id: String,
    pub phrase: String,
    pub language: String,
    pub severity: Severity,
    pub category: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Emitted to the alerting collaborator when a patient utterance matches an emergency phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencySignal {
    pub conversation_id: String,
    pub patient_id: String,
    pub severity: Severity,
    pub category: String,
    pub phrase: String,
    pub language: String,
    pub detected_at: DateTime<Utc>,
}

// --- Media ---

/// One media payload relayed from a real-time listener to transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub payload_type: u8,
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn call_status_round_trips_through_strings() {
        for status in [
            CallStatus::Initiated,
            CallStatus::Ringing,
            CallStatus::Answered,
            CallStatus::Connected,
            CallStatus::Ended,
            CallStatus::Completed,
            CallStatus::Failed,
        ] {
            let parsed = CallStatus::from_str(&status.to_string()).expect("should parse back");
            assert_eq!(parsed, status);
        }
        assert_eq!(CallStatus::from_str("RINGING").unwrap(), CallStatus::Ringing);
    }

    #[test]
    fn finished_and_terminal_states() {
        assert!(CallStatus::Ended.is_finished());
        assert!(!CallStatus::Ended.is_terminal());
        assert!(CallStatus::Completed.is_terminal());
        assert!(CallStatus::Failed.is_terminal());
        assert!(!CallStatus::Connected.is_finished());
    }

    #[test]
    fn outcome_accepts_both_cancel_spellings() {
        assert_eq!(CallOutcome::from_str("cancelled").unwrap(), CallOutcome::Cancelled);
        assert_eq!(CallOutcome::from_str("canceled").unwrap(), CallOutcome::Cancelled);
        assert_eq!(CallOutcome::from_str("no-answer").unwrap(), CallOutcome::NoAnswer);
        assert_eq!(CallOutcome::Cancelled.to_string(), "cancelled");
        assert!(CallOutcome::from_str("hung-up-angrily").is_err());
    }

    #[test]
    fn severity_is_ordered() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
        assert_eq!(Severity::from_str("critical").unwrap(), Severity::Critical);
        assert_eq!(Severity::Critical.to_string(), "CRITICAL");
    }

    #[test]
    fn new_conversation_starts_initiated_without_end_facts() {
        let c = Conversation::new("p-1", "caregiver-1", Some("   ".into()));
        assert_eq!(c.call_status, CallStatus::Initiated);
        assert_eq!(c.status, ConversationStatus::Initiated);
        assert!(c.call_end_time.is_none());
        assert!(c.call_duration_secs.is_none());
        assert!(c.call_notes.is_none(), "blank notes are dropped");
        assert!(c.analyzed_data.is_empty());
    }

    #[test]
    fn notes_accumulate() {
        let mut c = Conversation::new("p-1", "a-1", Some("first".into()));
        c.append_notes(Some("second"));
        c.append_notes(None);
        c.append_notes(Some(""));
        assert_eq!(c.call_notes.as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn analysis_record_fills_one_field() {
        let mut data = AnalyzedData::default();
        AnalysisRecord::FraudAbuse(FraudAbuseAnalysis {
            risk_level: RiskLevel::Low,
            risk_score: 0.1,
            confidence: 0.9,
            indicators: vec![],
            recommendations: vec![],
            summary: None,
        })
        .apply_to(&mut data);
        assert!(data.sentiment.is_none());
        assert!(data.fraud_abuse.is_some());
    }

    #[test]
    fn conversation_serializes_statuses_in_kebab_case() {
        let mut c = Conversation::new("p-1", "a-1", None);
        c.status = ConversationStatus::InProgress;
        c.call_outcome = Some(CallOutcome::NoAnswer);
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["status"], "in-progress");
        assert_eq!(json["call_outcome"], "no-answer");
        assert_eq!(json["call_status"], "initiated");
    }
}
