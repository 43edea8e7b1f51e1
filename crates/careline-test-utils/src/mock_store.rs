// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory implementation of every storage trait plus the patient directory.
//!
//! Mirrors the SQLite store's contract: `save_conversation` keeps the stored
//! `analyzed_data`, transcripts keep insertion order, conversations are never
//! deleted.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use careline_core::traits::adapter::PluginAdapter;
use careline_core::types::{
    AdapterType, AnalysisRecord, Conversation, EmergencyPhrase, HealthStatus, Message, Patient,
    RetryPolicy,
};
use careline_core::{CarelineError, ConversationStore, PatientDirectory, PhraseStore};

#[derive(Default)]
struct State {
    conversations: HashMap<String, Conversation>,
    messages: HashMap<String, Vec<Message>>,
    phrases: BTreeMap<String, EmergencyPhrase>,
    patients: HashMap<String, Patient>,
    policies: HashMap<String, RetryPolicy>,
}

/// Thread-safe in-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a patient in the directory.
    pub fn add_patient(&self, patient: Patient) {
        self.lock().patients.insert(patient.id.clone(), patient);
    }

    /// Set an organization's retry policy override.
    pub fn set_retry_policy(&self, organization_id: &str, policy: RetryPolicy) {
        self.lock()
            .policies
            .insert(organization_id.to_string(), policy);
    }

    /// Number of stored conversations.
    pub fn conversation_count(&self) -> usize {
        self.lock().conversations.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Patient fixture with a phone number and the given language.
pub fn patient(id: &str, language: &str) -> Patient {
    Patient {
        id: id.to_string(),
        organization_id: Some("org-1".to_string()),
        name: format!("Patient {id}"),
        phone: Some("+15550100200".to_string()),
        preferred_language: language.to_string(),
    }
}

#[async_trait]
impl PluginAdapter for InMemoryStore {
    fn name(&self) -> &str {
        "in-memory-store"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CarelineError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CarelineError> {
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), CarelineError> {
        let mut state = self.lock();
        if state.conversations.contains_key(&conversation.id) {
            return Err(CarelineError::Validation(format!(
                "conversation `{}` already exists",
                conversation.id
            )));
        }
        state
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, CarelineError> {
        Ok(self.lock().conversations.get(id).cloned())
    }

    async fn find_by_call_sid(
        &self,
        call_sid: &str,
    ) -> Result<Option<Conversation>, CarelineError> {
        Ok(self
            .lock()
            .conversations
            .values()
            .find(|c| c.call_sid.as_deref() == Some(call_sid))
            .cloned())
    }

    async fn save_conversation(&self, conversation: &Conversation) -> Result<(), CarelineError> {
        let mut state = self.lock();
        let stored = state
            .conversations
            .get_mut(&conversation.id)
            .ok_or_else(|| CarelineError::not_found("conversation", &conversation.id))?;
        let analyzed = std::mem::take(&mut stored.analyzed_data);
        let message_ids = std::mem::take(&mut stored.message_ids);
        *stored = conversation.clone();
        stored.analyzed_data = analyzed;
        stored.message_ids = message_ids;
        Ok(())
    }

    async fn record_analysis(
        &self,
        conversation_id: &str,
        record: AnalysisRecord,
    ) -> Result<(), CarelineError> {
        let mut state = self.lock();
        let stored = state
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| CarelineError::not_found("conversation", conversation_id))?;
        record.apply_to(&mut stored.analyzed_data);
        Ok(())
    }

    async fn append_message(&self, message: &Message) -> Result<(), CarelineError> {
        let mut state = self.lock();
        let stored = state
            .conversations
            .get_mut(&message.conversation_id)
            .ok_or_else(|| CarelineError::not_found("conversation", &message.conversation_id))?;
        stored.message_ids.push(message.id.clone());
        state
            .messages
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, CarelineError> {
        Ok(self
            .lock()
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn conversations_for_patient(
        &self,
        patient_id: &str,
    ) -> Result<Vec<Conversation>, CarelineError> {
        let mut calls: Vec<Conversation> = self
            .lock()
            .conversations
            .values()
            .filter(|c| c.patient_id == patient_id)
            .cloned()
            .collect();
        calls.sort_by(|a, b| b.call_start_time.cmp(&a.call_start_time));
        Ok(calls)
    }
}

#[async_trait]
impl PhraseStore for InMemoryStore {
    async fn list_phrases(&self) -> Result<Vec<EmergencyPhrase>, CarelineError> {
        Ok(self.lock().phrases.values().cloned().collect())
    }

    async fn upsert_phrase(&self, phrase: &EmergencyPhrase) -> Result<(), CarelineError> {
        self.lock()
            .phrases
            .insert(phrase.id.clone(), phrase.clone());
        Ok(())
    }

    async fn delete_phrase(&self, id: &str) -> Result<bool, CarelineError> {
        Ok(self.lock().phrases.remove(id).is_some())
    }
}

#[async_trait]
impl PatientDirectory for InMemoryStore {
    async fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>, CarelineError> {
        Ok(self.lock().patients.get(patient_id).cloned())
    }

    async fn retry_policy(
        &self,
        organization_id: &str,
    ) -> Result<Option<RetryPolicy>, CarelineError> {
        Ok(self.lock().policies.get(organization_id).copied())
    }
}
