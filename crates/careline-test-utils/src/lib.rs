// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Careline integration tests.
//!
//! Provides in-memory and mock adapters for fast, deterministic,
//! CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`InMemoryStore`] - conversation store, phrase store and patient directory
//! - [`MockTelephony`] - records placed calls, optionally fails them
//! - [`MockAnalysis`] - scripted sentiment and fraud/abuse responses
//! - [`RecordingAlertSink`] / [`RecordingTranscription`] - capture outbound signals and media

pub mod mock_analysis;
pub mod mock_store;
pub mod mock_telephony;
pub mod recording;

pub use mock_analysis::{Behavior, MockAnalysis};
pub use mock_store::{InMemoryStore, patient};
pub use mock_telephony::{MockTelephony, PlacedCall};
pub use recording::{RecordingAlertSink, RecordingTranscription};
