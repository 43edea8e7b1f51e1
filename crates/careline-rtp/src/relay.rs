// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Forwards queued media from listeners to the transcription sink.

use std::sync::Arc;

use careline_core::TranscriptionAdapter;
use careline_core::types::AudioChunk;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Item on the listener-to-relay queue.
#[derive(Debug, Clone)]
pub enum MediaEvent {
    /// One valid packet received for a call.
    Audio { call_id: Arc<str>, chunk: AudioChunk },
    /// The call's listener was stopped; no more audio will follow.
    Closed { call_id: String },
}

/// Create the bounded queue shared by a [`ListenerManager`](crate::ListenerManager)
/// and its [`MediaRelay`].
pub fn media_channel(capacity: usize) -> (mpsc::Sender<MediaEvent>, mpsc::Receiver<MediaEvent>) {
    mpsc::channel(capacity.max(1))
}

/// Single consumer of the media queue. Preserves per-call packet order.
pub struct MediaRelay {
    transcription: Arc<dyn TranscriptionAdapter + Send + Sync>,
    rx: mpsc::Receiver<MediaEvent>,
}

impl MediaRelay {
    pub fn new(
        transcription: Arc<dyn TranscriptionAdapter + Send + Sync>,
        rx: mpsc::Receiver<MediaEvent>,
    ) -> Self {
        Self { transcription, rx }
    }

    /// Run until the queue closes or `cancel` fires.
    ///
    /// Sink errors are logged and the event is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                MediaEvent::Audio { call_id, chunk } => {
                    if let Err(e) = self.transcription.push_audio(&call_id, chunk).await {
                        debug!(call_id = %call_id, error = %e, "transcription sink rejected audio");
                    }
                }
                MediaEvent::Closed { call_id } => {
                    if let Err(e) = self.transcription.close_call(&call_id).await {
                        warn!(call_id, error = %e, "failed to close transcription stream");
                    }
                }
            }
        }
        debug!("media relay stopped");
    }
}
