// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transcription sinks for relayed call media.
//!
//! [`WebSocketTranscription`] opens one streaming connection per call and
//! forwards payloads as binary frames; [`DiscardTranscription`] drops them.

pub mod websocket;

use std::sync::Arc;

use async_trait::async_trait;
use careline_config::model::TranscriptionConfig;
use careline_core::error::CarelineError;
use careline_core::traits::{PluginAdapter, TranscriptionAdapter};
use careline_core::types::{AdapterType, AudioChunk, HealthStatus};
use tracing::{info, trace};

pub use websocket::WebSocketTranscription;

/// Build the configured sink.
pub fn from_config(
    config: &TranscriptionConfig,
) -> Result<Arc<dyn TranscriptionAdapter + Send + Sync>, CarelineError> {
    match config.websocket_url.as_deref() {
        Some(url) => Ok(Arc::new(WebSocketTranscription::new(
            url,
            config.api_key.clone(),
        )?)),
        None => {
            info!("transcription.websocket_url not set, call media is discarded");
            Ok(Arc::new(DiscardTranscription))
        }
    }
}

/// Accepts and drops every payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardTranscription;

#[async_trait]
impl PluginAdapter for DiscardTranscription {
    fn name(&self) -> &str {
        "discard-transcription"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transcription
    }

    async fn health_check(&self) -> Result<HealthStatus, CarelineError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CarelineError> {
        Ok(())
    }
}

#[async_trait]
impl TranscriptionAdapter for DiscardTranscription {
    async fn push_audio(&self, call_id: &str, chunk: AudioChunk) -> Result<(), CarelineError> {
        trace!(call_id, sequence = chunk.sequence, "discarding media payload");
        Ok(())
    }

    async fn close_call(&self, _call_id: &str) -> Result<(), CarelineError> {
        Ok(())
    }
}
