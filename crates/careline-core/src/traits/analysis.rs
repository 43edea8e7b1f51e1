// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI analysis service adapter trait.

use async_trait::async_trait;

use crate::error::CarelineError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{AnalysisContext, FraudAbuseAnalysis, SentimentAnalysis, TranscriptEntry};

/// Adapter for the black-box post-call analysis service.
///
/// Implementations must not retry indefinitely; callers bound each request
/// with their own timeout.
#[async_trait]
pub trait AnalysisAdapter: PluginAdapter {
    /// Requests a sentiment assessment of the ordered transcript.
    async fn analyze_sentiment(
        &self,
        transcript: &[TranscriptEntry],
        context: &AnalysisContext,
    ) -> Result<SentimentAnalysis, CarelineError>;

    /// Requests a fraud/abuse risk assessment of the ordered transcript.
    async fn analyze_fraud_abuse(
        &self,
        transcript: &[TranscriptEntry],
        context: &AnalysisContext,
    ) -> Result<FraudAbuseAnalysis, CarelineError>;
}
