// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the conversation store, phrase store and
//! patient directory traits.

use async_trait::async_trait;
use tracing::{debug, info};

use careline_config::model::StorageConfig;
use careline_core::types::{
    AdapterType, AnalysisRecord, Conversation, EmergencyPhrase, HealthStatus, Message, Patient,
    RetryPolicy,
};
use careline_core::{
    CarelineError, ConversationStore, PatientDirectory, PhraseStore, PluginAdapter,
};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules.
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Open the database at the configured path, running migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, CarelineError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        info!(path = %config.database_path, "SQLite storage initialized");
        Ok(Self { db })
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CarelineError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CarelineError> {
        self.db.checkpoint().await?;
        debug!("shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), CarelineError> {
        queries::conversations::create_conversation(&self.db, conversation).await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, CarelineError> {
        queries::conversations::get_conversation(&self.db, id).await
    }

    async fn find_by_call_sid(
        &self,
        call_sid: &str,
    ) -> Result<Option<Conversation>, CarelineError> {
        queries::conversations::find_by_call_sid(&self.db, call_sid).await
    }

    async fn save_conversation(&self, conversation: &Conversation) -> Result<(), CarelineError> {
        queries::conversations::save_conversation(&self.db, conversation).await
    }

    async fn record_analysis(
        &self,
        conversation_id: &str,
        record: AnalysisRecord,
    ) -> Result<(), CarelineError> {
        queries::conversations::record_analysis(&self.db, conversation_id, record).await
    }

    async fn append_message(&self, message: &Message) -> Result<(), CarelineError> {
        queries::messages::append_message(&self.db, message).await
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, CarelineError> {
        queries::messages::messages_for_conversation(&self.db, conversation_id).await
    }

    async fn conversations_for_patient(
        &self,
        patient_id: &str,
    ) -> Result<Vec<Conversation>, CarelineError> {
        queries::conversations::conversations_for_patient(&self.db, patient_id).await
    }
}

#[async_trait]
impl PhraseStore for SqliteStore {
    async fn list_phrases(&self) -> Result<Vec<EmergencyPhrase>, CarelineError> {
        queries::phrases::list_phrases(&self.db).await
    }

    async fn upsert_phrase(&self, phrase: &EmergencyPhrase) -> Result<(), CarelineError> {
        queries::phrases::upsert_phrase(&self.db, phrase).await
    }

    async fn delete_phrase(&self, id: &str) -> Result<bool, CarelineError> {
        queries::phrases::delete_phrase(&self.db, id).await
    }
}

#[async_trait]
impl PatientDirectory for SqliteStore {
    async fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>, CarelineError> {
        queries::directory::get_patient(&self.db, patient_id).await
    }

    async fn retry_policy(
        &self,
        organization_id: &str,
    ) -> Result<Option<RetryPolicy>, CarelineError> {
        queries::directory::retry_policy(&self.db, organization_id).await
    }
}
