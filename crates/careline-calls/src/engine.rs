// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call lifecycle engine.
//!
//! [`CallEngine`] owns every write to a conversation's lifecycle fields.
//! Writes to one conversation are serialized through [`ConversationLocks`];
//! different conversations proceed independently. Side effects that talk to
//! slow collaborators (analysis, alerting) run in the background so status
//! callbacks return promptly.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use careline_config::CarelineConfig;
use careline_core::types::{
    CallHistory, CallOutcome, CallStatus, Conversation, ConversationStatus, EmergencySignal,
    Message, MessageRole, RetryPolicy,
};
use careline_core::{
    AlertAdapter, CarelineError, ConversationStore, PatientDirectory, TelephonyAdapter,
};
use careline_emergency::{DetectionResult, EmergencyDetector};
use careline_rtp::{ListenerHandle, ListenerManager};
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::finalization::FinalizationOrchestrator;
use crate::locks::ConversationLocks;
use crate::ports::PortRange;
use crate::transitions::can_transition;

/// Path the telephony gateway posts status callbacks to.
pub const STATUS_CALLBACK_PATH: &str = "/v1/telephony/status";

/// Engine settings derived from [`CarelineConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub public_base_url: String,
    pub port_range_start: u16,
    pub port_range_end: u16,
    pub default_retry_policy: RetryPolicy,
    /// Language used for detection when the patient record cannot be read.
    pub default_language: String,
}

impl EngineSettings {
    pub fn from_config(config: &CarelineConfig) -> Self {
        Self {
            public_base_url: config.gateway.public_base_url.clone(),
            port_range_start: config.listener.port_range_start,
            port_range_end: config.listener.port_range_end,
            default_retry_policy: RetryPolicy {
                max_retries: config.calls.retry_count,
                retry_interval_mins: config.calls.retry_interval_mins,
            },
            default_language: "en".to_string(),
        }
    }

    pub fn status_callback_url(&self) -> String {
        format!(
            "{}{STATUS_CALLBACK_PATH}",
            self.public_base_url.trim_end_matches('/')
        )
    }
}

/// External collaborators the engine reads from and writes to.
pub struct Collaborators {
    pub store: Arc<dyn ConversationStore + Send + Sync>,
    pub directory: Arc<dyn PatientDirectory + Send + Sync>,
    pub telephony: Arc<dyn TelephonyAdapter + Send + Sync>,
    pub alerts: Arc<dyn AlertAdapter + Send + Sync>,
}

/// Result of [`CallEngine::record_utterance`].
#[derive(Debug, Clone, Serialize)]
pub struct UtteranceOutcome {
    pub message: Message,
    /// Present for patient utterances only.
    pub detection: Option<DetectionResult>,
}

pub struct CallEngine {
    settings: EngineSettings,
    store: Arc<dyn ConversationStore + Send + Sync>,
    directory: Arc<dyn PatientDirectory + Send + Sync>,
    telephony: Arc<dyn TelephonyAdapter + Send + Sync>,
    alerts: Arc<dyn AlertAdapter + Send + Sync>,
    listeners: Arc<ListenerManager>,
    detector: Arc<EmergencyDetector>,
    finalizer: Arc<FinalizationOrchestrator>,
    ports: PortRange,
    locks: Arc<ConversationLocks>,
    /// Patient language per live conversation.
    languages: DashMap<String, String>,
    background: TaskTracker,
}

impl CallEngine {
    pub fn new(
        settings: EngineSettings,
        collaborators: Collaborators,
        listeners: Arc<ListenerManager>,
        detector: Arc<EmergencyDetector>,
        finalizer: Arc<FinalizationOrchestrator>,
    ) -> Self {
        let ports = PortRange::new(settings.port_range_start, settings.port_range_end);
        Self {
            settings,
            store: collaborators.store,
            directory: collaborators.directory,
            telephony: collaborators.telephony,
            alerts: collaborators.alerts,
            listeners,
            detector,
            finalizer,
            ports,
            locks: Arc::new(ConversationLocks::new()),
            languages: DashMap::new(),
            background: TaskTracker::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn listeners(&self) -> &Arc<ListenerManager> {
        &self.listeners
    }

    pub fn detector(&self) -> &Arc<EmergencyDetector> {
        &self.detector
    }

    pub fn finalizer(&self) -> &Arc<FinalizationOrchestrator> {
        &self.finalizer
    }

    /// Number of live conversations with a cached patient language.
    pub fn cached_languages(&self) -> usize {
        self.languages.len()
    }

    /// Place an outbound call to a patient.
    ///
    /// Patient and phone checks happen before the telephony gateway is
    /// contacted. A gateway rejection leaves a `failed` conversation behind
    /// so the scheduler can see the attempt.
    pub async fn initiate(
        &self,
        patient_id: &str,
        agent_id: &str,
        notes: Option<String>,
    ) -> Result<Conversation, CarelineError> {
        let patient = self
            .directory
            .get_patient(patient_id)
            .await?
            .ok_or_else(|| CarelineError::PatientNotFound {
                patient_id: patient_id.to_string(),
            })?;
        let phone = patient
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| CarelineError::NoPhoneNumber {
                patient_id: patient_id.to_string(),
            })?;

        let mut conversation = Conversation::new(&patient.id, agent_id, notes);
        self.store.create_conversation(&conversation).await?;

        let callback_url = self.settings.status_callback_url();
        match self.telephony.place_call(phone, &callback_url).await {
            Ok(call_sid) => {
                conversation.call_sid = Some(call_sid);
                conversation.updated_at = Utc::now();
                self.store.save_conversation(&conversation).await?;
                self.languages
                    .insert(conversation.id.clone(), patient.preferred_language);
                careline_prometheus::record_call_initiated();
                info!(
                    conversation_id = %conversation.id,
                    patient_id,
                    call_sid = conversation.call_sid.as_deref().unwrap_or_default(),
                    "call initiated"
                );
                Ok(conversation)
            }
            Err(e) => {
                warn!(
                    conversation_id = %conversation.id,
                    patient_id,
                    error = %e,
                    "telephony gateway rejected call"
                );
                let now = Utc::now();
                conversation.call_status = CallStatus::Failed;
                conversation.status = ConversationStatus::Failed;
                conversation.call_outcome = Some(CallOutcome::Failed);
                conversation.updated_at = now;
                if let Err(save_err) = self.store.save_conversation(&conversation).await {
                    error!(
                        conversation_id = %conversation.id,
                        error = %save_err,
                        "failed to record call placement failure"
                    );
                }
                careline_prometheus::record_transition("failed");
                Err(e)
            }
        }
    }

    /// Apply a status update addressed by conversation id or gateway call id.
    ///
    /// `ended` is routed through [`end`](Self::end). A repeated terminal
    /// status is a no-op; any other unreachable target is rejected with
    /// [`CarelineError::InvalidTransition`] and leaves the record untouched.
    pub async fn apply_status(
        &self,
        call_id: &str,
        status: CallStatus,
        outcome: Option<CallOutcome>,
        notes: Option<&str>,
    ) -> Result<Conversation, CarelineError> {
        if status == CallStatus::Ended {
            return self.end(call_id, outcome, notes).await;
        }

        let id = self.resolve(call_id).await?.id;
        let _guard = self.locks.lock(&id).await;
        let mut conversation = self.load(&id).await?;
        let current = conversation.call_status;

        if current == status && current.is_finished() {
            debug!(conversation_id = %id, %status, "duplicate terminal status ignored");
            return Ok(conversation);
        }
        if !can_transition(current, status) {
            return Err(CarelineError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        let mut bound: Option<ListenerHandle> = None;
        match status {
            CallStatus::Answered => conversation.status = ConversationStatus::InProgress,
            CallStatus::Connected => {
                bound = Some(self.bind_media(&conversation).await?);
                conversation.status = ConversationStatus::InProgress;
            }
            CallStatus::Failed => {
                conversation.status = ConversationStatus::Failed;
                conversation.call_outcome = Some(outcome.unwrap_or(CallOutcome::Failed));
            }
            _ => {}
        }

        conversation.call_status = status;
        conversation.append_notes(notes);
        conversation.updated_at = Utc::now();
        if let Err(e) = self.store.save_conversation(&conversation).await {
            if let Some(handle) = bound {
                self.listeners.stop(&handle.call_id).await;
            }
            return Err(e);
        }

        if status == CallStatus::Failed {
            self.languages.remove(&id);
        }
        careline_prometheus::record_transition(&status.to_string());
        info!(
            conversation_id = %id,
            from = %current,
            to = %status,
            media_port = bound.as_ref().map(|h| h.port),
            "call status updated"
        );
        Ok(conversation)
    }

    /// End a call with a mandatory outcome.
    ///
    /// Records end time and duration exactly once, releases the media
    /// listener and hands the conversation to finalization, which later
    /// moves it to `completed`. Ending an already ended call is a no-op.
    pub async fn end(
        &self,
        call_id: &str,
        outcome: Option<CallOutcome>,
        notes: Option<&str>,
    ) -> Result<Conversation, CarelineError> {
        let outcome = outcome.ok_or_else(|| {
            CarelineError::Validation("an outcome is required to end a call".to_string())
        })?;

        let id = self.resolve(call_id).await?.id;
        let guard = self.locks.lock(&id).await;
        let mut conversation = self.load(&id).await?;

        match conversation.call_status {
            CallStatus::Ended | CallStatus::Completed => {
                debug!(conversation_id = %id, "call already ended");
                return Ok(conversation);
            }
            CallStatus::Failed => {
                return Err(CarelineError::InvalidTransition {
                    from: CallStatus::Failed,
                    to: CallStatus::Ended,
                });
            }
            _ => {}
        }

        let now = Utc::now();
        let duration = (now - conversation.call_start_time).num_seconds().max(0);
        conversation.call_end_time = Some(now);
        conversation.call_duration_secs = Some(duration);
        conversation.call_outcome = Some(outcome);
        conversation.call_status = CallStatus::Ended;
        conversation.status = ConversationStatus::Completed;
        conversation.append_notes(notes);
        conversation.updated_at = now;
        self.store.save_conversation(&conversation).await?;
        drop(guard);

        let released = self.listeners.stop(&id).await;
        self.languages.remove(&id);
        careline_prometheus::record_transition("ended");
        careline_prometheus::record_call_ended(&outcome.to_string(), duration);
        info!(
            conversation_id = %id,
            %outcome,
            duration_secs = duration,
            media_released = released,
            "call ended"
        );

        self.finalizer.dispatch(&conversation, Arc::clone(&self.locks));
        Ok(conversation)
    }

    /// Append one utterance to the transcript of a live call.
    ///
    /// Patient utterances are checked against the emergency registry in
    /// the patient's language; a match is alerted in the background.
    pub async fn record_utterance(
        &self,
        call_id: &str,
        role: MessageRole,
        text: &str,
    ) -> Result<UtteranceOutcome, CarelineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CarelineError::Validation(
                "utterance text must not be empty".to_string(),
            ));
        }

        let id = self.resolve(call_id).await?.id;
        let guard = self.locks.lock(&id).await;
        let conversation = self.load(&id).await?;
        if conversation.call_status.is_finished() {
            return Err(CarelineError::Validation(format!(
                "call `{id}` is {} and no longer accepts utterances",
                conversation.call_status
            )));
        }
        let message = Message::new(&id, role, text);
        self.store.append_message(&message).await?;
        // Resolved under the lock: `end` evicts the cached language only after its own save.
        let language = match role {
            MessageRole::Patient => Some(self.language_for(&conversation).await),
            _ => None,
        };
        drop(guard);

        let detection = language.map(|language| {
            let result = self.detector.detect(text, &language);
            if result.is_emergency {
                self.raise_alert(&conversation, &result);
            }
            result
        });

        Ok(UtteranceOutcome { message, detection })
    }

    /// A conversation by id or gateway call id.
    pub async fn get_call(&self, call_id: &str) -> Result<Conversation, CarelineError> {
        self.resolve(call_id).await
    }

    /// Transcript of a conversation in insertion order.
    pub async fn transcript(&self, call_id: &str) -> Result<Vec<Message>, CarelineError> {
        let id = self.resolve(call_id).await?.id;
        self.store.messages(&id).await
    }

    /// A patient's calls, newest first, plus the re-dial policy that applies.
    pub async fn call_history(&self, patient_id: &str) -> Result<CallHistory, CarelineError> {
        let patient = self
            .directory
            .get_patient(patient_id)
            .await?
            .ok_or_else(|| CarelineError::PatientNotFound {
                patient_id: patient_id.to_string(),
            })?;
        let calls = self
            .store
            .conversations_for_patient(&patient.id)
            .await?
            .iter()
            .map(Conversation::summary)
            .collect();
        let retry_policy = match patient.organization_id.as_deref() {
            Some(org) => self
                .directory
                .retry_policy(org)
                .await?
                .unwrap_or(self.settings.default_retry_policy),
            None => self.settings.default_retry_policy,
        };
        Ok(CallHistory {
            patient_id: patient.id,
            calls,
            retry_policy,
        })
    }

    /// Wait for background alerts to finish. Used by tests and shutdown.
    pub async fn wait_idle(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }

    /// Release every listener and drain background work.
    ///
    /// Returns `false` if finalization or alert jobs were abandoned.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let stopped = self.listeners.stop_all().await;
        info!(listeners = stopped, "media listeners released");

        self.background.close();
        let alerts_drained = tokio::time::timeout(timeout, self.background.wait())
            .await
            .is_ok();
        if !alerts_drained {
            warn!("emergency alert delivery did not finish before shutdown");
        }
        let finalization_drained = self.finalizer.shutdown(timeout).await;
        alerts_drained && finalization_drained
    }

    async fn resolve(&self, call_id: &str) -> Result<Conversation, CarelineError> {
        if let Some(conversation) = self.store.get_conversation(call_id).await? {
            return Ok(conversation);
        }
        self.store
            .find_by_call_sid(call_id)
            .await?
            .ok_or_else(|| CarelineError::not_found("call", call_id))
    }

    async fn load(&self, id: &str) -> Result<Conversation, CarelineError> {
        self.store
            .get_conversation(id)
            .await?
            .ok_or_else(|| CarelineError::not_found("conversation", id))
    }

    /// Bind a media listener on the first free port of the configured range.
    async fn bind_media(&self, conversation: &Conversation) -> Result<ListenerHandle, CarelineError> {
        let channel_id = conversation
            .call_sid
            .clone()
            .unwrap_or_else(|| conversation.id.clone());

        for port in self.ports.candidates() {
            match self.listeners.start(port, &conversation.id, &channel_id).await {
                Ok(handle) => return Ok(handle),
                Err(CarelineError::PortConflict { .. }) | Err(CarelineError::Bind { .. }) => {
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(CarelineError::Bind {
            port: self.settings.port_range_end,
            source: io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!(
                    "no free media port in {}-{}",
                    self.settings.port_range_start, self.settings.port_range_end
                ),
            ),
        })
    }

    async fn language_for(&self, conversation: &Conversation) -> String {
        if let Some(language) = self.languages.get(&conversation.id) {
            return language.clone();
        }
        match self.directory.get_patient(&conversation.patient_id).await {
            Ok(Some(patient)) => {
                self.languages
                    .insert(conversation.id.clone(), patient.preferred_language.clone());
                patient.preferred_language
            }
            Ok(None) => {
                warn!(
                    conversation_id = %conversation.id,
                    patient_id = %conversation.patient_id,
                    "patient record missing, using default language"
                );
                self.settings.default_language.clone()
            }
            Err(e) => {
                warn!(
                    conversation_id = %conversation.id,
                    error = %e,
                    "patient lookup failed, using default language"
                );
                self.settings.default_language.clone()
            }
        }
    }

    fn raise_alert(&self, conversation: &Conversation, detection: &DetectionResult) {
        let (Some(severity), Some(category), Some(phrase)) = (
            detection.severity,
            detection.category.clone(),
            detection.phrase.clone(),
        ) else {
            return;
        };
        let signal = EmergencySignal {
            conversation_id: conversation.id.clone(),
            patient_id: conversation.patient_id.clone(),
            severity,
            category,
            phrase,
            language: detection.language.clone(),
            detected_at: Utc::now(),
        };
        warn!(
            conversation_id = %signal.conversation_id,
            patient_id = %signal.patient_id,
            severity = %signal.severity,
            category = %signal.category,
            "emergency phrase detected"
        );

        let alerts = Arc::clone(&self.alerts);
        self.background.spawn(async move {
            if let Err(e) = alerts.emit_emergency(&signal).await {
                error!(
                    conversation_id = %signal.conversation_id,
                    error = %e,
                    "failed to deliver emergency alert"
                );
            }
        });
    }
}
