// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock telephony gateway recording placed calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use careline_core::traits::adapter::PluginAdapter;
use careline_core::types::{AdapterType, HealthStatus};
use careline_core::{CarelineError, TelephonyAdapter};

/// One recorded `place_call` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedCall {
    pub phone: String,
    pub callback_url: String,
    pub call_sid: String,
}

/// Returns `CA`-prefixed sids and records every request.
#[derive(Default)]
pub struct MockTelephony {
    placed: Mutex<Vec<PlacedCall>>,
    fail: AtomicBool,
}

impl MockTelephony {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `place_call` fail with a telephony error.
    pub fn fail_calls(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn placed_calls(&self) -> Vec<PlacedCall> {
        self.placed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PluginAdapter for MockTelephony {
    fn name(&self) -> &str {
        "mock-telephony"
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
impl TelephonyAdapter for MockTelephony {
    async fn place_call(&self, phone: &str, callback_url: &str) -> Result<String, CarelineError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CarelineError::Telephony {
                message: "mock gateway rejected the call".to_string(),
                source: None,
            });
        }
        let call_sid = format!("CA{}", uuid::Uuid::new_v4().simple());
        self.placed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PlacedCall {
                phone: phone.to_string(),
                callback_url: callback_url.to_string(),
                call_sid: call_sid.clone(),
            });
        Ok(call_sid)
    }
}
