// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alerting and transcription sinks that record what they receive.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use careline_core::traits::adapter::PluginAdapter;
use careline_core::types::{AdapterType, AudioChunk, EmergencySignal, HealthStatus};
use careline_core::{AlertAdapter, CarelineError, TranscriptionAdapter};

/// Records every emergency signal.
#[derive(Default)]
pub struct RecordingAlertSink {
    signals: Mutex<Vec<EmergencySignal>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<EmergencySignal> {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Poll until at least `count` signals arrived or `timeout` elapsed.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<EmergencySignal> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let signals = self.signals();
            if signals.len() >= count || tokio::time::Instant::now() >= deadline {
                return signals;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl PluginAdapter for RecordingAlertSink {
    fn name(&self) -> &str {
        "recording-alerts"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Alerting
    }

    async fn health_check(&self) -> Result<HealthStatus, CarelineError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CarelineError> {
        Ok(())
    }
}

#[async_trait]
impl AlertAdapter for RecordingAlertSink {
    async fn emit_emergency(&self, signal: &EmergencySignal) -> Result<(), CarelineError> {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(signal.clone());
        Ok(())
    }
}

#[derive(Default)]
struct TranscriptionState {
    chunks: HashMap<String, Vec<AudioChunk>>,
    closed: Vec<String>,
}

/// Records relayed audio per call and the order calls were closed in.
#[derive(Default)]
pub struct RecordingTranscription {
    state: Mutex<TranscriptionState>,
}

impl RecordingTranscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self, call_id: &str) -> Vec<AudioChunk> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .chunks
            .get(call_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn closed_calls(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
            .clone()
    }
}

#[async_trait]
impl PluginAdapter for RecordingTranscription {
    fn name(&self) -> &str {
        "recording-transcription"
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
impl TranscriptionAdapter for RecordingTranscription {
    async fn push_audio(&self, call_id: &str, chunk: AudioChunk) -> Result<(), CarelineError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .chunks
            .entry(call_id.to_string())
            .or_default()
            .push(chunk);
        Ok(())
    }

    async fn close_call(&self, call_id: &str) -> Result<(), CarelineError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
            .push(call_id.to_string());
        Ok(())
    }
}
