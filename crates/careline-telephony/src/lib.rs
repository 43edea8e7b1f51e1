// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Twilio-compatible telephony gateway adapter.
//!
//! - [`TwilioTelephony`] places outbound calls through the REST API.
//! - [`DisabledTelephony`] stands in when no account is configured.
//! - [`status`] maps status callbacks onto lifecycle changes.
//! - [`signature`] verifies callback authenticity.

pub mod signature;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use careline_config::model::TelephonyConfig;
use careline_core::error::CarelineError;
use careline_core::traits::{PluginAdapter, TelephonyAdapter};
use careline_core::types::{AdapterType, HealthStatus};
use serde::Deserialize;
use tracing::{debug, info, warn};

pub use signature::{SIGNATURE_HEADER, compute_signature, verify_signature};
pub use status::{StatusCallback, StatusChange, map_gateway_status};

/// Instructions used when no `voice_url` is configured: hold the line open
/// so media keeps flowing to the listener.
const HOLD_TWIML: &str = r#"<Response><Pause length="3600"/></Response>"#;

/// Gateway lifecycle events the status callback subscribes to.
const CALLBACK_EVENTS: [&str; 4] = ["initiated", "ringing", "answered", "completed"];

/// Build the configured adapter: the REST client when an account is set,
/// [`DisabledTelephony`] otherwise.
pub fn from_config(
    config: &TelephonyConfig,
) -> Result<Arc<dyn TelephonyAdapter + Send + Sync>, CarelineError> {
    match TwilioTelephony::from_config(config)? {
        Some(adapter) => Ok(Arc::new(adapter)),
        None => Ok(Arc::new(DisabledTelephony)),
    }
}

#[derive(Debug, Deserialize)]
struct CreateCallResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    code: Option<u32>,
    message: String,
}

/// REST client for outbound calls.
pub struct TwilioTelephony {
    client: reqwest::Client,
    api_base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    voice_url: Option<String>,
}

impl TwilioTelephony {
    /// Builds the adapter from configuration.
    ///
    /// Returns `Ok(None)` when no account is configured; outbound dialing
    /// is then unavailable.
    pub fn from_config(config: &TelephonyConfig) -> Result<Option<Self>, CarelineError> {
        let Some(account_sid) = config.account_sid.clone() else {
            info!("telephony.account_sid not set, outbound dialing disabled");
            return Ok(None);
        };
        let auth_token = config.auth_token.clone().ok_or_else(|| {
            CarelineError::Config("telephony.auth_token is required with account_sid".into())
        })?;
        let from_number = config.from_number.clone().ok_or_else(|| {
            CarelineError::Config("telephony.from_number is required with account_sid".into())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| CarelineError::Telephony {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        info!(account_sid = %account_sid, "telephony adapter initialized");
        Ok(Some(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
            from_number,
            voice_url: config.voice_url.clone(),
        }))
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Calls.json",
            self.api_base_url, self.account_sid
        )
    }
}

#[async_trait]
impl PluginAdapter for TwilioTelephony {
    fn name(&self) -> &str {
        "twilio"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Telephony
    }

    async fn health_check(&self) -> Result<HealthStatus, CarelineError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CarelineError> {
        Ok(())
    }
}

#[async_trait]
impl TelephonyAdapter for TwilioTelephony {
    async fn place_call(&self, phone: &str, callback_url: &str) -> Result<String, CarelineError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("To", phone),
            ("From", self.from_number.as_str()),
            ("StatusCallback", callback_url),
            ("StatusCallbackMethod", "POST"),
        ];
        for event in CALLBACK_EVENTS {
            form.push(("StatusCallbackEvent", event));
        }
        match self.voice_url.as_deref() {
            Some(url) => form.push(("Url", url)),
            None => form.push(("Twiml", HOLD_TWIML)),
        }

        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| CarelineError::Telephony {
                message: format!("call placement request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| CarelineError::Telephony {
            message: format!("failed to read gateway response: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(status = %status, "call placement response received");

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(err) => match err.code {
                    Some(code) => format!("gateway rejected call ({code}): {}", err.message),
                    None => format!("gateway rejected call: {}", err.message),
                },
                Err(_) => format!("gateway returned {status}: {body}"),
            };
            warn!(status = %status, "call placement rejected");
            return Err(CarelineError::Telephony {
                message,
                source: None,
            });
        }

        let created: CreateCallResponse =
            serde_json::from_str(&body).map_err(|e| CarelineError::Telephony {
                message: format!("failed to parse gateway response: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(created.sid)
    }
}

/// Refuses every call placement. Status callbacks and the rest of the
/// lifecycle keep working.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTelephony;

#[async_trait]
impl PluginAdapter for DisabledTelephony {
    fn name(&self) -> &str {
        "disabled-telephony"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Telephony
    }

    async fn health_check(&self) -> Result<HealthStatus, CarelineError> {
        Ok(HealthStatus::Degraded(
            "outbound dialing disabled: telephony.account_sid not set".into(),
        ))
    }

    async fn shutdown(&self) -> Result<(), CarelineError> {
        Ok(())
    }
}

#[async_trait]
impl TelephonyAdapter for DisabledTelephony {
    async fn place_call(&self, _phone: &str, _callback_url: &str) -> Result<String, CarelineError> {
        Err(CarelineError::Telephony {
            message: "outbound dialing is disabled (telephony.account_sid not set)".into(),
            source: None,
        })
    }
}
