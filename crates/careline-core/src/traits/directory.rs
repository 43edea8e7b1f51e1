// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only patient directory adapter trait.

use async_trait::async_trait;

use crate::error::CarelineError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Patient, RetryPolicy};

/// Read access to patient and organization records owned by the
/// record-management system.
#[async_trait]
pub trait PatientDirectory: PluginAdapter {
    /// Fetches a patient record.
    async fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>, CarelineError>;

    /// Returns the organization's re-dial policy override, if one is configured.
    async fn retry_policy(
        &self,
        organization_id: &str,
    ) -> Result<Option<RetryPolicy>, CarelineError>;
}
