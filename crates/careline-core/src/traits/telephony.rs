// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telephony gateway adapter trait (outbound call placement).

use async_trait::async_trait;

use crate::error::CarelineError;
use crate::traits::adapter::PluginAdapter;

/// Adapter for the telephony gateway that dials patients.
#[async_trait]
pub trait TelephonyAdapter: PluginAdapter {
    /// Places an outbound call to `phone` and returns the gateway's correlation id.
    ///
    /// `callback_url` receives asynchronous status callbacks for the call.
    async fn place_call(&self, phone: &str, callback_url: &str) -> Result<String, CarelineError>;
}
