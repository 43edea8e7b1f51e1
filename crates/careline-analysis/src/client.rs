// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the analysis service.
//!
//! Provides [`AnalysisClient`] which handles request construction,
//! authentication and failure classification. Each call is a single
//! attempt; retries are the caller's decision.

use std::time::Duration;

use careline_core::CarelineError;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::types::ApiErrorResponse;

pub const SENTIMENT_PATH: &str = "/v1/analysis/sentiment";
pub const FRAUD_ABUSE_PATH: &str = "/v1/analysis/fraud-abuse";

#[derive(Debug, Clone)]
pub struct AnalysisClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl AnalysisClient {
    /// Creates a new analysis service client.
    ///
    /// `api_key`, when present, is sent as a bearer token on every request.
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, CarelineError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                CarelineError::Config(format!("invalid analysis API key header value: {e}"))
            })?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| CarelineError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `path` and decode the JSON response.
    ///
    /// 429, 5xx, transport failures and timeouts are transient
    /// ([`CarelineError::Provider`] / [`CarelineError::Timeout`]); any other
    /// non-2xx status or an undecodable body is
    /// [`CarelineError::ProviderRejected`].
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, CarelineError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!(status = %status, path, "analysis response received");

        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|e| CarelineError::ProviderRejected {
                status: Some(status.as_u16()),
                message: format!("failed to parse analysis response: {e}"),
            });
        }

        let message = match serde_json::from_str::<ApiErrorResponse>(&text) {
            Ok(api_err) => format!(
                "analysis service error ({}): {}",
                api_err.error.type_, api_err.error.message
            ),
            Err(_) => format!("analysis service returned {status}: {text}"),
        };

        if is_transient_error(status) {
            Err(CarelineError::Provider {
                message,
                source: None,
            })
        } else {
            Err(CarelineError::ProviderRejected {
                status: Some(status.as_u16()),
                message,
            })
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> CarelineError {
        if e.is_timeout() {
            CarelineError::Timeout {
                duration: self.timeout,
            }
        } else {
            CarelineError::Provider {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            }
        }
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
