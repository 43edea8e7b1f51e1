// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./careline.toml` > `~/.config/careline/careline.toml` >
//! `/etc/careline/careline.toml` with environment variable overrides via `CARELINE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::CarelineConfig;

/// Config sections addressable from the environment, in `CARELINE_<SECTION>_<KEY>` form.
pub(crate) const ENV_SECTIONS: &[&str] = &[
    "service",
    "gateway",
    "listener",
    "calls",
    "emergency",
    "analysis",
    "telephony",
    "alerting",
    "transcription",
    "storage",
    "prometheus",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/careline/careline.toml`
/// 3. `~/.config/careline/careline.toml`
/// 4. `./careline.toml`
/// 5. `CARELINE_*` environment variables
pub fn load_config() -> Result<CarelineConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<CarelineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CarelineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CarelineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CarelineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for the standard lookup, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CarelineConfig::default()))
        .merge(Toml::file("/etc/careline/careline.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("careline/careline.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("careline.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `CARELINE_LISTENER_PORT_RANGE_START` to
/// `listener.port_range_start`.
///
/// Uses `Env::map()` rather than `Env::split("_")`: keys themselves contain
/// underscores, so only the first section separator becomes a dot.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("CARELINE_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section) {
            if let Some(field) = rest.strip_prefix('_') {
                return format!("{section}.{field}");
            }
        }
    }
    key.to_string()
}
