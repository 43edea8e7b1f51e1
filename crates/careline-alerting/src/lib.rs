// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Emergency alert sinks.
//!
//! Notification fan-out (pages, SMS, caregiver dashboards) lives outside
//! this service. The sinks here hand each [`EmergencySignal`] to that
//! system: [`WebhookAlertSink`] POSTs it as JSON, [`LogAlertSink`] only
//! records it in the structured log.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use careline_config::model::AlertingConfig;
use careline_core::error::CarelineError;
use careline_core::traits::{AlertAdapter, PluginAdapter};
use careline_core::types::{AdapterType, EmergencySignal, HealthStatus};
use tracing::{debug, error, info};

/// Build the configured sink: webhook when `alerting.webhook_url` is set,
/// log-only otherwise.
pub fn from_config(
    config: &AlertingConfig,
) -> Result<Arc<dyn AlertAdapter + Send + Sync>, CarelineError> {
    match config.webhook_url.as_deref() {
        Some(url) => Ok(Arc::new(WebhookAlertSink::new(
            url,
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => {
            info!("alerting.webhook_url not set, emergency signals are logged only");
            Ok(Arc::new(LogAlertSink))
        }
    }
}

/// Logs every signal at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

#[async_trait]
impl PluginAdapter for LogAlertSink {
    fn name(&self) -> &str {
        "log-alerts"
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
impl AlertAdapter for LogAlertSink {
    async fn emit_emergency(&self, signal: &EmergencySignal) -> Result<(), CarelineError> {
        error!(
            conversation_id = %signal.conversation_id,
            patient_id = %signal.patient_id,
            severity = %signal.severity,
            category = %signal.category,
            language = %signal.language,
            detected_at = %signal.detected_at,
            "EMERGENCY: patient utterance matched an emergency phrase"
        );
        Ok(())
    }
}

/// POSTs each signal as JSON to a fixed URL.
pub struct WebhookAlertSink {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl WebhookAlertSink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, CarelineError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| CarelineError::Config(format!("invalid alerting.webhook_url: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CarelineError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl PluginAdapter for WebhookAlertSink {
    fn name(&self) -> &str {
        "webhook-alerts"
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
impl AlertAdapter for WebhookAlertSink {
    async fn emit_emergency(&self, signal: &EmergencySignal) -> Result<(), CarelineError> {
        // The log line is the fallback record if delivery fails.
        LogAlertSink.emit_emergency(signal).await?;

        let response = self
            .client
            .post(self.url.clone())
            .json(signal)
            .send()
            .await
            .map_err(|e| CarelineError::Provider {
                message: format!("alert webhook request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CarelineError::Provider {
                message: format!("alert webhook returned {status}"),
                source: None,
            });
        }
        debug!(
            conversation_id = %signal.conversation_id,
            status = %status,
            "emergency signal delivered"
        );
        Ok(())
    }
}
