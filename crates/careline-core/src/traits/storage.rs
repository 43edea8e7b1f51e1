// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter traits for conversations, transcripts and the phrase registry.

use async_trait::async_trait;

use crate::error::CarelineError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{AnalysisRecord, Conversation, EmergencyPhrase, Message};

/// Persistence for conversations and their ordered transcripts.
///
/// Conversations are never deleted.
#[async_trait]
pub trait ConversationStore: PluginAdapter {
    /// Inserts a new conversation.
    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), CarelineError>;

    /// Fetches a conversation by id.
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, CarelineError>;

    /// Fetches a conversation by the telephony gateway's correlation id.
    async fn find_by_call_sid(&self, call_sid: &str)
    -> Result<Option<Conversation>, CarelineError>;

    /// Overwrites the lifecycle fields of an existing conversation.
    ///
    /// Must not overwrite `analyzed_data`, which only finalization writes.
    async fn save_conversation(&self, conversation: &Conversation) -> Result<(), CarelineError>;

    /// Writes one enrichment result into `analyzed_data` without touching lifecycle fields.
    async fn record_analysis(
        &self,
        conversation_id: &str,
        record: AnalysisRecord,
    ) -> Result<(), CarelineError>;

    /// Appends a message to the transcript, preserving insertion order.
    async fn append_message(&self, message: &Message) -> Result<(), CarelineError>;

    /// Returns the transcript in insertion order.
    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, CarelineError>;

    /// Lists a patient's conversations, newest first.
    async fn conversations_for_patient(
        &self,
        patient_id: &str,
    ) -> Result<Vec<Conversation>, CarelineError>;
}

/// Persistence for the administrator-managed emergency phrase registry.
#[async_trait]
pub trait PhraseStore: PluginAdapter {
    /// Lists every phrase, active or not.
    async fn list_phrases(&self) -> Result<Vec<EmergencyPhrase>, CarelineError>;

    /// Inserts or replaces a phrase by id.
    async fn upsert_phrase(&self, phrase: &EmergencyPhrase) -> Result<(), CarelineError>;

    /// Removes a phrase. Returns `false` if it did not exist.
    async fn delete_phrase(&self, id: &str) -> Result<bool, CarelineError>;
}
