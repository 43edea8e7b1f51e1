// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alerting adapter trait for emergency signal fan-out.

use async_trait::async_trait;

use crate::error::CarelineError;
use crate::traits::adapter::PluginAdapter;
use crate::types::EmergencySignal;

/// Adapter that hands emergency signals to downstream notification delivery.
#[async_trait]
pub trait AlertAdapter: PluginAdapter {
    /// Emits one emergency signal.
    async fn emit_emergency(&self, signal: &EmergencySignal) -> Result<(), CarelineError>;
}
