// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics adapter for the Careline call session engine.
//!
//! Uses the metrics-rs facade with the Prometheus exporter.
//! Metrics are rendered as Prometheus text format via the `render()` method,
//! which is exposed through the gateway's /metrics endpoint.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use careline_core::CarelineError;
use careline_core::traits::adapter::PluginAdapter;
use careline_core::types::{AdapterType, HealthStatus};

pub use recording::{
    record_analysis_latency, record_call_ended, record_call_initiated, record_emergency,
    record_finalization, record_rtp_dropped, record_rtp_malformed, record_rtp_packet,
    record_transition, register_metrics, set_active_listeners,
};

/// Prometheus metrics adapter.
///
/// Installs the Prometheus recorder and exposes a handle for rendering
/// metrics in Prometheus text format.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Install the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call returns an error.
    pub fn new() -> Result<Self, CarelineError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            CarelineError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Wrap an existing handle without installing a global recorder.
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Get a reference to the Prometheus handle for rendering.
    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, CarelineError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CarelineError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global recorder can only be installed once per process, so tests
    // scope a local recorder instead of calling `PrometheusAdapter::new()`.
    fn local_adapter() -> (metrics_exporter_prometheus::PrometheusRecorder, PrometheusAdapter) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let adapter = PrometheusAdapter::from_handle(recorder.handle());
        (recorder, adapter)
    }

    #[test]
    fn recorded_counters_render() {
        let (recorder, adapter) = local_adapter();
        metrics::with_local_recorder(&recorder, || {
            record_rtp_packet();
            record_rtp_packet();
            record_rtp_malformed();
            record_emergency("CRITICAL", "es");
        });

        let rendered = adapter.render();
        assert!(rendered.contains("careline_rtp_packets_total 2"), "{rendered}");
        assert!(rendered.contains("careline_rtp_malformed_total 1"));
        assert!(rendered.contains("careline_emergency_detections_total"));
        assert!(rendered.contains("severity=\"CRITICAL\""));
    }

    #[test]
    fn listener_gauge_tracks_latest_value() {
        let (recorder, adapter) = local_adapter();
        metrics::with_local_recorder(&recorder, || {
            set_active_listeners(3);
            set_active_listeners(1);
        });
        assert!(adapter.render().contains("careline_active_listeners 1"));
    }

    #[tokio::test]
    async fn adapter_reports_healthy() {
        let (_recorder, adapter) = local_adapter();
        assert_eq!(adapter.name(), "prometheus");
        assert_eq!(adapter.adapter_type(), AdapterType::Observability);
        assert_eq!(adapter.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
