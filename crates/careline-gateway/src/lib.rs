// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface for the Careline call session engine.
//!
//! Three route groups share one [`GatewayState`]:
//! - public health and metrics
//! - the telephony status webhook (optionally signature-checked)
//! - the bearer-authenticated call, listener and phrase APIs

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod webhook;

pub use auth::AuthConfig;
pub use error::ApiError;
pub use server::{GatewayState, HealthState, ServerConfig, WebhookConfig, build_router, start_server};
