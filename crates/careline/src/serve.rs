// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `careline serve` command implementation.
//!
//! Opens SQLite storage, loads the emergency phrase registry, builds the
//! collaborator adapters from configuration, wires them into the call
//! engine and serves the HTTP gateway until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use careline_calls::{
    CallEngine, Collaborators, EngineSettings, FinalizationOrchestrator, FinalizerSettings,
};
use careline_config::CarelineConfig;
use careline_core::error::CarelineError;
use careline_core::traits::{AnalysisAdapter, PluginAdapter, TranscriptionAdapter};
use careline_emergency::{EmergencyDetector, PhraseRegistry};
use careline_gateway::{GatewayState, ServerConfig};
use careline_prometheus::PrometheusAdapter;
use careline_rtp::{ListenerManager, MediaRelay, media_channel};
use careline_security::{RedactingWriter, SecretList, configured_secrets};
use careline_storage::SqliteStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::shutdown;

/// Upper bound on waiting for finalization and alert jobs at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything `serve` owns between startup and shutdown.
pub struct Services {
    pub engine: Arc<CallEngine>,
    pub registry: Arc<PhraseRegistry>,
    pub store: Arc<SqliteStore>,
    pub prometheus: Option<Arc<PrometheusAdapter>>,
    transcription: Arc<dyn TranscriptionAdapter + Send + Sync>,
    relay: JoinHandle<()>,
    relay_cancel: CancellationToken,
}

/// Build storage, detection, media and collaborator adapters.
pub async fn build_services(config: &CarelineConfig) -> Result<Services, CarelineError> {
    let store = Arc::new(SqliteStore::open(&config.storage).await?);

    let registry = Arc::new(PhraseRegistry::load(store.clone()).await?);
    if config.emergency.seed_builtin_phrases {
        let seeded = registry.seed_builtin_if_empty().await?;
        if seeded > 0 {
            info!(count = seeded, "built-in emergency phrases seeded");
        }
    }
    info!(
        phrases = registry.list().len(),
        version = registry.version(),
        "emergency phrase registry loaded"
    );
    let detector = Arc::new(EmergencyDetector::new(registry.clone()));

    let prometheus = if config.prometheus.enabled {
        Some(Arc::new(PrometheusAdapter::new()?))
    } else {
        None
    };

    let transcription = careline_transcription::from_config(&config.transcription)?;
    let (media_tx, media_rx) = media_channel(config.listener.media_queue_capacity);
    let relay_cancel = CancellationToken::new();
    let relay = tokio::spawn(
        MediaRelay::new(transcription.clone(), media_rx).run(relay_cancel.clone()),
    );
    let listeners = Arc::new(ListenerManager::new(config.listener.clone(), media_tx));

    let analysis = careline_analysis::HttpAnalysis::from_config(&config.analysis)?
        .map(|a| Arc::new(a) as Arc<dyn AnalysisAdapter + Send + Sync>);
    let finalizer = Arc::new(FinalizationOrchestrator::new(
        store.clone(),
        analysis,
        FinalizerSettings::from_config(&config.analysis),
    ));

    let engine = Arc::new(CallEngine::new(
        EngineSettings::from_config(config),
        Collaborators {
            store: store.clone(),
            directory: store.clone(),
            telephony: careline_telephony::from_config(&config.telephony)?,
            alerts: careline_alerting::from_config(&config.alerting)?,
        },
        listeners,
        detector,
        finalizer,
    ));

    Ok(Services {
        engine,
        registry,
        store,
        prometheus,
        transcription,
        relay,
        relay_cancel,
    })
}

impl Services {
    /// Gateway state over these services.
    pub fn gateway_state(&self, config: &CarelineConfig) -> GatewayState {
        let render = self.prometheus.clone().map(|p| {
            Arc::new(move || p.render()) as Arc<dyn Fn() -> String + Send + Sync>
        });
        GatewayState::new(config, self.engine.clone(), self.registry.clone(), render)
    }

    /// Release listeners, drain background work, then close adapters.
    ///
    /// Returns `false` if any pending work was abandoned.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        let drained = self.engine.shutdown(timeout).await;
        if !drained {
            warn!("shutdown timed out with background work pending");
        }

        self.relay_cancel.cancel();
        if let Err(e) = self.relay.await {
            warn!(error = %e, "media relay task failed");
        }
        if let Err(e) = self.transcription.shutdown().await {
            warn!(error = %e, "transcription adapter shutdown failed");
        }
        if let Err(e) = self.store.shutdown().await {
            warn!(error = %e, "storage shutdown failed");
        }
        drained
    }
}

/// Runs the `careline serve` command.
pub async fn run_serve(config: CarelineConfig) -> Result<(), CarelineError> {
    init_tracing(&config.service.log_level, configured_secrets(&config));

    info!(service = %config.service.name, "starting careline serve");

    let services = build_services(&config).await?;
    let cancel = shutdown::install_signal_handler();

    let server_config = ServerConfig::from_config(&config);
    let result =
        careline_gateway::start_server(&server_config, services.gateway_state(&config), cancel.clone())
            .await;
    cancel.cancel();

    services.shutdown(DRAIN_TIMEOUT).await;
    info!("careline serve shutdown complete");
    result
}

/// Initialize the tracing subscriber, writing through the redacting writer.
fn init_tracing(log_level: &str, secrets: SecretList) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("careline={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(move || RedactingWriter::new(std::io::stderr(), secrets.clone()))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_core::PhraseStore;

    fn test_config(dir: &tempfile::TempDir) -> CarelineConfig {
        let mut config = CarelineConfig::default();
        config.storage.database_path = dir
            .path()
            .join("careline.db")
            .to_string_lossy()
            .into_owned();
        config
    }

    #[tokio::test]
    async fn services_start_and_drain() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);

        let services = build_services(&config).await.unwrap();
        assert!(!services.registry.list().is_empty(), "built-ins are seeded");
        assert!(services.engine.listeners().is_empty());
        assert!(services.prometheus.is_none());

        let state = services.gateway_state(&config);
        assert!(state.health.prometheus_render.is_none());
        assert!(state.webhook.callback_url.ends_with("/v1/telephony/status"));

        assert!(services.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn seeding_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir);
        config.emergency.seed_builtin_phrases = false;

        let services = build_services(&config).await.unwrap();
        assert!(services.registry.list().is_empty());
        assert!(services.store.list_phrases().await.unwrap().is_empty());
        services.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn initiate_requires_known_patient() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let services = build_services(&config).await.unwrap();

        let err = services
            .engine
            .initiate("p-1", "caregiver-1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CarelineError::PatientNotFound { .. }));
        services.shutdown(Duration::from_secs(1)).await;
    }
}
