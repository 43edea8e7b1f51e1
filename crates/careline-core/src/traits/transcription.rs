// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transcription adapter trait receiving relayed call media.

use async_trait::async_trait;

use crate::error::CarelineError;
use crate::traits::adapter::PluginAdapter;
use crate::types::AudioChunk;

/// Adapter that streams call audio to an external speech-to-text service.
///
/// Transcribed utterances come back through the engine's utterance intake,
/// not through this trait.
#[async_trait]
pub trait TranscriptionAdapter: PluginAdapter {
    /// Forwards one media payload for `call_id`.
    async fn push_audio(&self, call_id: &str, chunk: AudioChunk) -> Result<(), CarelineError>;

    /// Signals that no more media will arrive for `call_id`.
    async fn close_call(&self, call_id: &str) -> Result<(), CarelineError>;
}
