// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket streaming sink.
//!
//! Per call: connect lazily on the first payload, send a `start` text
//! frame, then one binary frame per payload, then a `stop` text frame and
//! a close frame when the call's listener goes away. Each connection is
//! owned by a writer task fed through a bounded channel.

use std::collections::HashMap;

use async_trait::async_trait;
use careline_core::error::CarelineError;
use careline_core::traits::{PluginAdapter, TranscriptionAdapter};
use careline_core::types::{AdapterType, AudioChunk, HealthStatus};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

/// Frames buffered per call before payloads are rejected.
const STREAM_BUFFER: usize = 256;

pub struct WebSocketTranscription {
    endpoint: Url,
    api_key: Option<String>,
    streams: Mutex<HashMap<String, mpsc::Sender<Message>>>,
}

impl WebSocketTranscription {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self, CarelineError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            CarelineError::Config(format!("invalid transcription.websocket_url: {e}"))
        })?;
        Ok(Self {
            endpoint,
            api_key,
            streams: Mutex::new(HashMap::new()),
        })
    }

    /// Number of calls with an open stream.
    pub async fn open_streams(&self) -> usize {
        self.streams.lock().await.len()
    }

    fn call_url(&self, call_id: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("call_id", call_id);
        url
    }

    async fn connect(
        &self,
        call_id: &str,
        first: &AudioChunk,
    ) -> Result<mpsc::Sender<Message>, CarelineError> {
        let url = self.call_url(call_id);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| provider("invalid transcription request", e))?;
        if let Some(key) = &self.api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| CarelineError::Config(format!("invalid transcription API key: {e}")))?;
            value.set_sensitive(true);
            request.headers_mut().insert("authorization", value);
        }

        let (mut ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| provider("transcription connect failed", e))?;

        let start = serde_json::json!({
            "event": "start",
            "call_id": call_id,
            "ssrc": first.ssrc,
            "payload_type": first.payload_type,
        });
        ws.send(Message::text(start.to_string()))
            .await
            .map_err(|e| provider("transcription start frame failed", e))?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(write_stream(call_id.to_string(), ws, rx));
        info!(call_id, "transcription stream opened");
        Ok(tx)
    }
}

async fn write_stream(
    call_id: String,
    mut ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx: mpsc::Receiver<Message>,
) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = ws.send(frame).await {
            warn!(call_id, error = %e, "transcription stream write failed");
            return;
        }
    }
    if let Err(e) = ws.close(None).await {
        debug!(call_id, error = %e, "transcription stream close failed");
    }
    debug!(call_id, "transcription stream closed");
}

fn provider(context: &str, e: impl std::error::Error + Send + Sync + 'static) -> CarelineError {
    CarelineError::Provider {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for WebSocketTranscription {
    fn name(&self) -> &str {
        "websocket-transcription"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transcription
    }

    async fn health_check(&self) -> Result<HealthStatus, CarelineError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CarelineError> {
        // Dropping the senders lets each writer flush and close.
        self.streams.lock().await.clear();
        Ok(())
    }
}

#[async_trait]
impl TranscriptionAdapter for WebSocketTranscription {
    async fn push_audio(&self, call_id: &str, chunk: AudioChunk) -> Result<(), CarelineError> {
        let mut streams = self.streams.lock().await;
        let tx = match streams.get(call_id) {
            Some(tx) => tx.clone(),
            None => {
                let tx = self.connect(call_id, &chunk).await?;
                streams.insert(call_id.to_string(), tx.clone());
                tx
            }
        };

        match tx.try_send(Message::binary(chunk.payload)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(CarelineError::Provider {
                message: format!("transcription stream for `{call_id}` is backlogged"),
                source: None,
            }),
            Err(TrySendError::Closed(_)) => {
                // Writer died; the next payload reconnects.
                streams.remove(call_id);
                Err(CarelineError::Provider {
                    message: format!("transcription stream for `{call_id}` closed"),
                    source: None,
                })
            }
        }
    }

    async fn close_call(&self, call_id: &str) -> Result<(), CarelineError> {
        let Some(tx) = self.streams.lock().await.remove(call_id) else {
            return Ok(());
        };
        let stop = serde_json::json!({"event": "stop", "call_id": call_id});
        if tx.send(Message::text(stop.to_string())).await.is_err() {
            debug!(call_id, "transcription stream already closed");
        }
        Ok(())
    }
}
