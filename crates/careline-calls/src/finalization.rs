// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-call enrichment.
//!
//! Once a call ends, the transcript is sent to the analysis service for a
//! sentiment assessment and, for long enough transcripts, a fraud/abuse
//! assessment. Both requests run concurrently, each with its own timeout
//! and retry budget, and each success is written independently. Whatever
//! enrichment yields, the job ends by moving the call from `ended` to
//! `completed`; it never touches outcome, end time or duration.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use careline_config::model::AnalysisConfig;
use careline_core::types::{
    AnalysisContext, AnalysisRecord, CallStatus, Conversation, TranscriptEntry,
};
use careline_core::{AnalysisAdapter, CarelineError, ConversationStore};
use chrono::Utc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::locks::ConversationLocks;
use crate::transitions::can_transition;

/// Timeout and retry settings for finalization requests.
#[derive(Debug, Clone)]
pub struct FinalizerSettings {
    pub request_timeout: Duration,
    pub max_retries: u32,
    /// Base delay between attempts; attempt `n` waits `n * retry_backoff`.
    pub retry_backoff: Duration,
    pub fraud_min_messages: usize,
}

impl FinalizerSettings {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(500),
            fraud_min_messages: config.fraud_min_messages,
        }
    }
}

impl Default for FinalizerSettings {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

/// Runs enrichment in the background, off the request path.
pub struct FinalizationOrchestrator {
    store: Arc<dyn ConversationStore + Send + Sync>,
    analysis: Option<Arc<dyn AnalysisAdapter + Send + Sync>>,
    settings: FinalizerSettings,
    tracker: TaskTracker,
}

impl FinalizationOrchestrator {
    /// `analysis = None` disables enrichment; ended calls keep empty
    /// `analyzed_data` but are still completed.
    pub fn new(
        store: Arc<dyn ConversationStore + Send + Sync>,
        analysis: Option<Arc<dyn AnalysisAdapter + Send + Sync>>,
        settings: FinalizerSettings,
    ) -> Self {
        Self {
            store,
            analysis,
            settings,
            tracker: TaskTracker::new(),
        }
    }

    pub fn settings(&self) -> &FinalizerSettings {
        &self.settings
    }

    /// Number of finalization jobs still running.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Schedule finalization for an ended conversation and return immediately.
    ///
    /// `locks` must be the same lock table the lifecycle writer uses, so the
    /// closing `ended -> completed` step is serialized with status updates.
    pub fn dispatch(&self, conversation: &Conversation, locks: Arc<ConversationLocks>) {
        let job = FinalizationJob {
            store: Arc::clone(&self.store),
            analysis: self.analysis.clone(),
            locks,
            settings: self.settings.clone(),
            context: AnalysisContext {
                conversation_id: conversation.id.clone(),
                patient_id: conversation.patient_id.clone(),
                call_duration_secs: conversation.call_duration_secs,
                call_outcome: conversation.call_outcome,
            },
        };
        self.tracker.spawn(job.run());
    }

    /// Wait for every dispatched job to finish, then accept new ones again.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Stop accepting jobs and wait up to `timeout` for running ones.
    ///
    /// Returns `false` if jobs were still running when the timeout elapsed.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, "waiting for finalization jobs to drain");
        }
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    pending = self.tracker.len(),
                    "finalization drain timed out, abandoning remaining jobs"
                );
                false
            }
        }
    }
}

struct FinalizationJob {
    store: Arc<dyn ConversationStore + Send + Sync>,
    analysis: Option<Arc<dyn AnalysisAdapter + Send + Sync>>,
    locks: Arc<ConversationLocks>,
    settings: FinalizerSettings,
    context: AnalysisContext,
}

impl FinalizationJob {
    async fn run(self) {
        match &self.analysis {
            Some(analysis) => self.enrich(analysis.as_ref()).await,
            None => debug!(
                conversation_id = %self.context.conversation_id,
                "analysis service not configured, skipping enrichment"
            ),
        }
        self.complete().await;
    }

    async fn enrich(&self, analysis: &(dyn AnalysisAdapter + Send + Sync)) {
        let conversation_id = self.context.conversation_id.as_str();
        let messages = match self.store.messages(conversation_id).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(conversation_id, error = %e, "failed to load transcript for finalization");
                return;
            }
        };
        if messages.is_empty() {
            debug!(conversation_id, "empty transcript, nothing to analyze");
            return;
        }

        let transcript: Vec<TranscriptEntry> = messages.iter().map(TranscriptEntry::from).collect();
        let wants_fraud = transcript.len() >= self.settings.fraud_min_messages;

        let sentiment = async {
            let result = with_retry("sentiment", &self.settings, || {
                analysis.analyze_sentiment(&transcript, &self.context)
            })
            .await;
            if let Some(analysis) = result {
                self.write("sentiment", AnalysisRecord::Sentiment(analysis)).await;
            }
        };

        let fraud = async {
            if !wants_fraud {
                debug!(
                    conversation_id,
                    messages = transcript.len(),
                    "transcript too short for fraud/abuse analysis"
                );
                return;
            }
            let result = with_retry("fraud_abuse", &self.settings, || {
                analysis.analyze_fraud_abuse(&transcript, &self.context)
            })
            .await;
            if let Some(analysis) = result {
                self.write("fraud_abuse", AnalysisRecord::FraudAbuse(analysis)).await;
            }
        };

        tokio::join!(sentiment, fraud);
    }

    /// Apply `ended -> completed` under the conversation's lock.
    async fn complete(&self) {
        let conversation_id = self.context.conversation_id.as_str();
        let _guard = self.locks.lock(conversation_id).await;
        let mut conversation = match self.store.get_conversation(conversation_id).await {
            Ok(Some(conversation)) => conversation,
            Ok(None) => {
                warn!(conversation_id, "conversation missing at completion");
                return;
            }
            Err(e) => {
                warn!(conversation_id, error = %e, "failed to load conversation for completion");
                return;
            }
        };
        if !can_transition(conversation.call_status, CallStatus::Completed) {
            debug!(
                conversation_id,
                call_status = %conversation.call_status,
                "conversation not awaiting completion"
            );
            return;
        }

        conversation.call_status = CallStatus::Completed;
        conversation.updated_at = Utc::now();
        match self.store.save_conversation(&conversation).await {
            Ok(()) => {
                careline_prometheus::record_transition("completed");
                info!(conversation_id, "call completed");
            }
            Err(e) => warn!(conversation_id, error = %e, "failed to record call completion"),
        }
    }

    async fn write(&self, kind: &'static str, record: AnalysisRecord) {
        let conversation_id = self.context.conversation_id.as_str();
        match self.store.record_analysis(conversation_id, record).await {
            Ok(()) => {
                careline_prometheus::record_finalization(kind, "ok");
                info!(conversation_id, kind, "analysis recorded");
            }
            Err(e) => {
                careline_prometheus::record_finalization(kind, "store_error");
                warn!(conversation_id, kind, error = %e, "failed to record analysis");
            }
        }
    }
}

/// Call `request` until it succeeds, fails permanently, or the retry budget runs out.
///
/// Each attempt is bounded by `settings.request_timeout`. Only transient
/// errors are retried. Returns `None` on final failure; the failure is
/// logged here so callers only handle the success case.
async fn with_retry<T, F, Fut>(
    kind: &'static str,
    settings: &FinalizerSettings,
    mut request: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CarelineError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let started = Instant::now();
        let result = match tokio::time::timeout(settings.request_timeout, request()).await {
            Ok(result) => result,
            Err(_) => Err(CarelineError::Timeout {
                duration: settings.request_timeout,
            }),
        };
        careline_prometheus::record_analysis_latency(kind, started.elapsed().as_secs_f64());

        match result {
            Ok(value) => return Some(value),
            Err(e) if e.is_transient() && attempt <= settings.max_retries => {
                debug!(kind, attempt, error = %e, "transient analysis failure, retrying");
                tokio::time::sleep(settings.retry_backoff * attempt).await;
            }
            Err(e) => {
                careline_prometheus::record_finalization(kind, "failed");
                warn!(kind, attempts = attempt, error = %e, "analysis request failed");
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_settings(max_retries: u32) -> FinalizerSettings {
        FinalizerSettings {
            request_timeout: Duration::from_millis(50),
            max_retries,
            retry_backoff: Duration::from_millis(1),
            fraud_min_messages: 5,
        }
    }

    #[tokio::test]
    async fn retry_stops_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Option<()> = with_retry("sentiment", &fast_settings(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(CarelineError::Provider {
                    message: "503".into(),
                    source: None,
                })
            }
        })
        .await;
        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Option<()> = with_retry("sentiment", &fast_settings(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CarelineError::Validation("bad transcript".into())) }
        })
        .await;
        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeouts_count_as_transient() {
        let calls = AtomicU32::new(0);
        let result = with_retry("fraud_abuse", &fast_settings(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok::<_, CarelineError>(n)
            }
        })
        .await;
        assert_eq!(result, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn settings_follow_config() {
        let config = AnalysisConfig {
            timeout_secs: 7,
            max_retries: 4,
            fraud_min_messages: 9,
            ..AnalysisConfig::default()
        };
        let settings = FinalizerSettings::from_config(&config);
        assert_eq!(settings.request_timeout, Duration::from_secs(7));
        assert_eq!(settings.max_retries, 4);
        assert_eq!(settings.fraud_min_messages, 9);
    }
}
