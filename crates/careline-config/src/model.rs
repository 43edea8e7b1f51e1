// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Careline call session engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Careline configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CarelineConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP gateway for webhooks and the call API.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Real-time media listeners.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Call lifecycle and scheduler-facing defaults.
    #[serde(default)]
    pub calls: CallsConfig,

    /// Emergency phrase detection.
    #[serde(default)]
    pub emergency: EmergencyConfig,

    /// AI analysis service used by finalization.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Telephony gateway credentials and endpoints.
    #[serde(default)]
    pub telephony: TelephonyConfig,

    /// Emergency alert delivery.
    #[serde(default)]
    pub alerting: AlertingConfig,

    /// Streaming transcription service.
    #[serde(default)]
    pub transcription: TranscriptionConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Prometheus metrics export.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in logs and health output.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "careline".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// TCP port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on the call API. `None` rejects every API request.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Externally reachable base URL, used to build status-callback URLs
    /// handed to the telephony gateway.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
            public_base_url: default_public_base_url(),
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3100
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:3100".to_string()
}

/// Real-time media listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ListenerConfig {
    /// Address UDP listeners bind to.
    #[serde(default = "default_listener_bind")]
    pub bind_address: String,

    /// First UDP port handed out to calls (inclusive).
    #[serde(default = "default_port_range_start")]
    pub port_range_start: u16,

    /// Last UDP port handed out to calls (inclusive).
    #[serde(default = "default_port_range_end")]
    pub port_range_end: u16,

    /// Seconds without packets after which a listener is reported stale.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Capacity of the media queue between listeners and transcription relay.
    #[serde(default = "default_media_queue_capacity")]
    pub media_queue_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_listener_bind(),
            port_range_start: default_port_range_start(),
            port_range_end: default_port_range_end(),
            stale_after_secs: default_stale_after_secs(),
            media_queue_capacity: default_media_queue_capacity(),
        }
    }
}

fn default_listener_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port_range_start() -> u16 {
    15000
}

fn default_port_range_end() -> u16 {
    15999
}

fn default_stale_after_secs() -> u64 {
    30
}

fn default_media_queue_capacity() -> usize {
    1024
}

/// Call lifecycle configuration.
///
/// The retry fields are the default organization policy handed to the
/// external scheduler; the engine never re-dials on its own.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CallsConfig {
    /// Maximum re-dial attempts after a no-answer or failed call.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Minutes between re-dial attempts.
    #[serde(default = "default_retry_interval_mins")]
    pub retry_interval_mins: u32,
}

impl Default for CallsConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            retry_interval_mins: default_retry_interval_mins(),
        }
    }
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_interval_mins() -> u32 {
    15
}

/// Emergency detection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmergencyConfig {
    /// Load the built-in English/Spanish phrases when the registry is empty.
    #[serde(default = "default_true")]
    pub seed_builtin_phrases: bool,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            seed_builtin_phrases: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// AI analysis service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Base URL of the analysis service. `None` disables enrichment.
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key sent as a bearer token.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_analysis_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after a transient failure (429, 5xx, timeout).
    #[serde(default = "default_analysis_max_retries")]
    pub max_retries: u32,

    /// Minimum transcript length before fraud/abuse analysis is requested.
    #[serde(default = "default_fraud_min_messages")]
    pub fraud_min_messages: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: default_analysis_timeout_secs(),
            max_retries: default_analysis_max_retries(),
            fraud_min_messages: default_fraud_min_messages(),
        }
    }
}

fn default_analysis_timeout_secs() -> u64 {
    20
}

fn default_analysis_max_retries() -> u32 {
    1
}

fn default_fraud_min_messages() -> usize {
    5
}

/// Telephony gateway configuration (Twilio-compatible REST API).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelephonyConfig {
    /// Account identifier. `None` disables outbound dialing.
    #[serde(default)]
    pub account_sid: Option<String>,

    /// Auth token, also used to verify webhook signatures.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Caller id presented to patients.
    #[serde(default)]
    pub from_number: Option<String>,

    /// REST API base URL.
    #[serde(default = "default_telephony_api_base")]
    pub api_base_url: String,

    /// URL the gateway fetches call instructions from once the patient answers.
    #[serde(default)]
    pub voice_url: Option<String>,

    /// Reject status callbacks without a valid signature.
    #[serde(default)]
    pub validate_signatures: bool,
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            api_base_url: default_telephony_api_base(),
            voice_url: None,
            validate_signatures: false,
        }
    }
}

fn default_telephony_api_base() -> String {
    "https://api.twilio.com/2010-04-01".to_string()
}

/// Emergency alert delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AlertingConfig {
    /// Webhook receiving emergency signals as JSON. `None` logs signals only.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Webhook request timeout in seconds.
    #[serde(default = "default_alert_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_alert_timeout_secs(),
        }
    }
}

fn default_alert_timeout_secs() -> u64 {
    5
}

/// Streaming transcription configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TranscriptionConfig {
    /// WebSocket endpoint receiving call audio. `None` discards media.
    #[serde(default)]
    pub websocket_url: Option<String>,

    /// API key sent as a bearer token during the WebSocket handshake.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("careline").join("careline.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "careline.db".to_string())
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default)]
    pub enabled: bool,
}
