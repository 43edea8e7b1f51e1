// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the external collaborators of the call engine.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod alerting;
pub mod analysis;
pub mod directory;
pub mod storage;
pub mod telephony;
pub mod transcription;

pub use adapter::PluginAdapter;
pub use alerting::AlertAdapter;
pub use analysis::AnalysisAdapter;
pub use directory::PatientDirectory;
pub use storage::{ConversationStore, PhraseStore};
pub use telephony::TelephonyAdapter;
pub use transcription::TranscriptionAdapter;
