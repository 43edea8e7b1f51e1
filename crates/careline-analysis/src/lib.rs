// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI analysis service adapter for the Careline call session engine.
//!
//! This crate implements [`AnalysisAdapter`] over the analysis service's
//! JSON API. The service's scoring logic is opaque; this crate only moves
//! transcripts out and structured assessments back.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use careline_config::model::AnalysisConfig;
use careline_core::error::CarelineError;
use careline_core::traits::{AnalysisAdapter, PluginAdapter};
use careline_core::types::{
    AdapterType, AnalysisContext, FraudAbuseAnalysis, HealthStatus, SentimentAnalysis,
    TranscriptEntry,
};
use tracing::{debug, info};

use crate::client::{AnalysisClient, FRAUD_ABUSE_PATH, SENTIMENT_PATH};
use crate::types::AnalysisRequest;

/// Analysis service adapter implementing [`AnalysisAdapter`].
pub struct HttpAnalysis {
    client: AnalysisClient,
}

impl HttpAnalysis {
    /// Builds the adapter from configuration.
    ///
    /// Returns `Ok(None)` when no `analysis.base_url` is configured, which
    /// disables post-call enrichment.
    pub fn from_config(config: &AnalysisConfig) -> Result<Option<Self>, CarelineError> {
        let Some(base_url) = config.base_url.as_deref() else {
            info!("analysis.base_url not set, post-call enrichment disabled");
            return Ok(None);
        };
        let client = AnalysisClient::new(
            base_url,
            config.api_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(base_url = client.base_url(), "analysis service adapter initialized");
        Ok(Some(Self { client }))
    }

    pub fn with_client(client: AnalysisClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PluginAdapter for HttpAnalysis {
    fn name(&self) -> &str {
        "http-analysis"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Analysis
    }

    async fn health_check(&self) -> Result<HealthStatus, CarelineError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CarelineError> {
        Ok(())
    }
}

#[async_trait]
impl AnalysisAdapter for HttpAnalysis {
    async fn analyze_sentiment(
        &self,
        transcript: &[TranscriptEntry],
        context: &AnalysisContext,
    ) -> Result<SentimentAnalysis, CarelineError> {
        debug!(
            conversation_id = %context.conversation_id,
            messages = transcript.len(),
            "requesting sentiment analysis"
        );
        self.client
            .post(SENTIMENT_PATH, &AnalysisRequest { transcript, context })
            .await
    }

    async fn analyze_fraud_abuse(
        &self,
        transcript: &[TranscriptEntry],
        context: &AnalysisContext,
    ) -> Result<FraudAbuseAnalysis, CarelineError> {
        debug!(
            conversation_id = %context.conversation_id,
            messages = transcript.len(),
            "requesting fraud/abuse analysis"
        );
        self.client
            .post(FRAUD_ABUSE_PATH, &AnalysisRequest { transcript, context })
            .await
    }
}
