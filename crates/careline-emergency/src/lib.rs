// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Emergency phrase detection for live call transcripts.
//!
//! [`PhraseRegistry`] holds the administrator-managed phrase list and its
//! version; [`EmergencyDetector`] matches utterances against a compiled
//! cache of that list, strictly within the utterance's language.

pub mod builtin;
pub mod compiled;
pub mod detector;
pub mod registry;

pub use builtin::builtin_phrases;
pub use detector::{DetectionResult, EmergencyDetector, PhraseMatch};
pub use registry::{PhraseRegistry, RegistrySnapshot, validate_phrase};
