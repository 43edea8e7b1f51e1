// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call lifecycle for the Careline call session engine.
//!
//! - [`CallEngine`] places calls, applies gateway status updates through the
//!   [`transitions`] table, owns media listener allocation and runs emergency
//!   detection on live utterances.
//! - [`FinalizationOrchestrator`] enriches ended calls with sentiment and
//!   fraud/abuse analysis in the background.

pub mod engine;
pub mod finalization;
pub mod locks;
pub mod ports;
pub mod transitions;

pub use engine::{CallEngine, Collaborators, EngineSettings, STATUS_CALLBACK_PATH, UtteranceOutcome};
pub use finalization::{FinalizationOrchestrator, FinalizerSettings};
pub use transitions::{allowed_targets, can_transition};
