// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Careline call session engine.
//!
//! This crate provides the domain types (conversations, messages, call
//! statuses, analysis results, emergency phrases), the shared error type, and
//! the adapter traits every external collaborator implements.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CarelineError;
pub use types::{
    AdapterType, AnalysisRecord, AnalyzedData, CallOutcome, CallStatus, Conversation,
    ConversationStatus, EmergencyPhrase, EmergencySignal, HealthStatus, Message, MessageRole,
    Patient, RetryPolicy, Severity,
};

// Re-export all adapter traits at crate root.
pub use traits::{
    AlertAdapter, AnalysisAdapter, ConversationStore, PatientDirectory, PhraseStore,
    PluginAdapter, TelephonyAdapter, TranscriptionAdapter,
};
