// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use careline_calls::{CallEngine, STATUS_CALLBACK_PATH};
use careline_config::CarelineConfig;
use careline_core::CarelineError;
use careline_emergency::PhraseRegistry;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::{handlers, webhook};

/// Health state for unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Status callback verification settings.
#[derive(Clone)]
pub struct WebhookConfig {
    /// Gateway auth token the callbacks are signed with.
    pub auth_token: Option<String>,
    pub validate_signatures: bool,
    /// The exact URL handed to the gateway; part of the signed payload.
    pub callback_url: String,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[redacted]"))
            .field("validate_signatures", &self.validate_signatures)
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<CallEngine>,
    pub registry: Arc<PhraseRegistry>,
    pub auth: AuthConfig,
    pub webhook: WebhookConfig,
    pub health: HealthState,
}

impl GatewayState {
    pub fn new(
        config: &CarelineConfig,
        engine: Arc<CallEngine>,
        registry: Arc<PhraseRegistry>,
        prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    ) -> Self {
        let callback_url = engine.settings().status_callback_url();
        Self {
            engine,
            registry,
            auth: AuthConfig {
                bearer_token: config.gateway.bearer_token.clone(),
            },
            webhook: WebhookConfig {
                auth_token: config.telephony.auth_token.clone(),
                validate_signatures: config.telephony.validate_signatures,
                callback_url,
            },
            health: HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render,
            },
        }
    }
}

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

impl ServerConfig {
    pub fn from_config(config: &CarelineConfig) -> Self {
        Self {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        }
    }
}

/// Build the full router.
///
/// - `GET /health`, `GET /metrics`: public
/// - `POST /v1/telephony/status`: public, signature-checked when enabled
/// - everything else under `/v1`: bearer token required
pub fn build_router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .route("/metrics", get(handlers::get_public_metrics))
        .route(STATUS_CALLBACK_PATH, post(webhook::post_status_callback))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/calls", post(handlers::post_call))
        .route("/v1/calls/{id}", get(handlers::get_call))
        .route("/v1/calls/{id}/status", post(handlers::post_call_status))
        .route("/v1/calls/{id}/end", post(handlers::post_call_end))
        .route("/v1/calls/{id}/utterances", post(handlers::post_utterance))
        .route("/v1/calls/{id}/messages", get(handlers::get_messages))
        .route("/v1/patients/{id}/calls", get(handlers::get_patient_calls))
        .route("/v1/listeners", get(handlers::get_listeners))
        .route("/v1/listeners/health", get(handlers::get_listener_health))
        .route("/v1/listeners/{port}", get(handlers::get_listener))
        .route("/v1/emergency/phrases", get(handlers::get_phrases))
        .route(
            "/v1/emergency/phrases/{id}",
            put(handlers::put_phrase).delete(handlers::delete_phrase),
        )
        .route("/v1/emergency/matches", post(handlers::post_matches))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

/// Start the gateway HTTP server; returns once `cancel` fires and in-flight
/// requests have completed.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), CarelineError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CarelineError::Bind {
            port: config.port,
            source: e,
        })?;

    tracing::info!("gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| CarelineError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_from_defaults() {
        let config = ServerConfig::from_config(&CarelineConfig::default());
        let debug = format!("{config:?}");
        assert!(debug.contains(&config.host));
        assert_eq!(config.port, CarelineConfig::default().gateway.port);
    }

    #[test]
    fn webhook_config_debug_redacts_token() {
        let config = WebhookConfig {
            auth_token: Some("tw-secret".into()),
            validate_signatures: true,
            callback_url: "https://careline.example/v1/telephony/status".into(),
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("tw-secret"));
        assert!(debug.contains("callback_url"));
    }
}
