// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes:
//! bind addresses, port ranges, positive timeouts, and parseable URLs.

use crate::diagnostic::ConfigError;
use crate::model::CarelineConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CarelineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "gateway.host", &config.gateway.host);
    check_address(
        &mut errors,
        "listener.bind_address",
        &config.listener.bind_address,
    );

    let listener = &config.listener;
    if listener.port_range_start == 0 {
        errors.push(invalid("listener.port_range_start must be non-zero".into()));
    }
    if listener.port_range_start > listener.port_range_end {
        errors.push(ConfigError::PortRange {
            start: listener.port_range_start,
            end: listener.port_range_end,
        });
    }
    if listener.stale_after_secs == 0 {
        errors.push(invalid("listener.stale_after_secs must be positive".into()));
    }
    if listener.media_queue_capacity == 0 {
        errors.push(invalid(
            "listener.media_queue_capacity must be positive".into(),
        ));
    }

    if config.analysis.timeout_secs == 0 {
        errors.push(invalid("analysis.timeout_secs must be positive".into()));
    }
    if config.analysis.fraud_min_messages == 0 {
        errors.push(invalid(
            "analysis.fraud_min_messages must be at least 1".into(),
        ));
    }
    if config.alerting.timeout_secs == 0 {
        errors.push(invalid("alerting.timeout_secs must be positive".into()));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(invalid("storage.database_path must not be empty".into()));
    }

    check_url(
        &mut errors,
        "gateway.public_base_url",
        Some(&config.gateway.public_base_url),
    );
    check_url(
        &mut errors,
        "telephony.api_base_url",
        Some(&config.telephony.api_base_url),
    );
    check_url(
        &mut errors,
        "telephony.voice_url",
        config.telephony.voice_url.as_ref(),
    );
    check_url(
        &mut errors,
        "analysis.base_url",
        config.analysis.base_url.as_ref(),
    );
    check_url(
        &mut errors,
        "alerting.webhook_url",
        config.alerting.webhook_url.as_ref(),
    );
    check_url(
        &mut errors,
        "transcription.websocket_url",
        config.transcription.websocket_url.as_ref(),
    );

    if config.telephony.validate_signatures
        && config
            .telephony
            .auth_token
            .as_deref()
            .is_none_or(|t| t.trim().is_empty())
    {
        errors.push(invalid(
            "telephony.validate_signatures requires telephony.auth_token".into(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Validation { message }
}

fn check_address(errors: &mut Vec<ConfigError>, key: &str, value: &str) {
    let addr = value.trim();
    if addr.is_empty() {
        errors.push(invalid(format!("{key} must not be empty")));
        return;
    }
    let is_valid_ip = addr.parse::<std::net::IpAddr>().is_ok();
    let is_valid_hostname = addr
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
    if !is_valid_ip && !is_valid_hostname {
        errors.push(invalid(format!(
            "{key} `{addr}` is not a valid IP address or hostname"
        )));
    }
}

fn check_url(errors: &mut Vec<ConfigError>, key: &str, value: Option<&String>) {
    if let Some(raw) = value {
        if let Err(e) = url::Url::parse(raw) {
            errors.push(invalid(format!("{key} `{raw}` is not a valid URL: {e}")));
        }
    }
}
