// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock AI analysis service with per-kind scripted behavior.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use careline_core::traits::adapter::PluginAdapter;
use careline_core::types::{
    AdapterType, AnalysisContext, ConcernLevel, FraudAbuseAnalysis, HealthStatus, RiskLevel,
    SentimentAnalysis, SentimentLabel, TranscriptEntry,
};
use careline_core::{AnalysisAdapter, CarelineError};

/// How one kind of analysis request behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    /// Fail with a transient provider error every time.
    Fail,
    /// Fail transiently this many times, then succeed.
    FailTimes(u32),
    /// Sleep before succeeding.
    Delay(Duration),
}

pub struct MockAnalysis {
    sentiment: Mutex<Behavior>,
    fraud: Mutex<Behavior>,
    sentiment_calls: AtomicU32,
    fraud_calls: AtomicU32,
}

impl MockAnalysis {
    pub fn new(sentiment: Behavior, fraud: Behavior) -> Self {
        Self {
            sentiment: Mutex::new(sentiment),
            fraud: Mutex::new(fraud),
            sentiment_calls: AtomicU32::new(0),
            fraud_calls: AtomicU32::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Behavior::Succeed, Behavior::Succeed)
    }

    pub fn failing() -> Self {
        Self::new(Behavior::Fail, Behavior::Fail)
    }

    pub fn sentiment_calls(&self) -> u32 {
        self.sentiment_calls.load(Ordering::SeqCst)
    }

    pub fn fraud_calls(&self) -> u32 {
        self.fraud_calls.load(Ordering::SeqCst)
    }

    /// Canned sentiment result returned on success.
    pub fn sentiment_result() -> SentimentAnalysis {
        SentimentAnalysis {
            overall_sentiment: SentimentLabel::Positive,
            sentiment_score: 0.6,
            confidence: 0.9,
            key_emotions: vec!["calm".to_string()],
            concern_level: ConcernLevel::Low,
            summary: Some("Patient sounded well.".to_string()),
        }
    }

    /// Canned fraud/abuse result returned on success.
    pub fn fraud_result() -> FraudAbuseAnalysis {
        FraudAbuseAnalysis {
            risk_level: RiskLevel::None,
            risk_score: 0.02,
            confidence: 0.85,
            indicators: vec![],
            recommendations: vec![],
            summary: None,
        }
    }

    async fn run(behavior: &Mutex<Behavior>, kind: &str) -> Result<(), CarelineError> {
        let current = *behavior.lock().unwrap_or_else(PoisonError::into_inner);
        match current {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(transient(kind)),
            Behavior::FailTimes(0) => Ok(()),
            Behavior::FailTimes(n) => {
                *behavior.lock().unwrap_or_else(PoisonError::into_inner) =
                    Behavior::FailTimes(n - 1);
                Err(transient(kind))
            }
            Behavior::Delay(d) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
        }
    }
}

fn transient(kind: &str) -> CarelineError {
    CarelineError::Provider {
        message: format!("mock {kind} analysis unavailable"),
        source: None,
    }
}

#[async_trait]
impl PluginAdapter for MockAnalysis {
    fn name(&self) -> &str {
        "mock-analysis"
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
impl AnalysisAdapter for MockAnalysis {
    async fn analyze_sentiment(
        &self,
        _transcript: &[TranscriptEntry],
        _context: &AnalysisContext,
    ) -> Result<SentimentAnalysis, CarelineError> {
        self.sentiment_calls.fetch_add(1, Ordering::SeqCst);
        Self::run(&self.sentiment, "sentiment").await?;
        Ok(Self::sentiment_result())
    }

    async fn analyze_fraud_abuse(
        &self,
        _transcript: &[TranscriptEntry],
        _context: &AnalysisContext,
    ) -> Result<FraudAbuseAnalysis, CarelineError> {
        self.fraud_calls.fetch_add(1, Ordering::SeqCst);
        Self::run(&self.fraud, "fraud").await?;
        Ok(Self::fraud_result())
    }
}
