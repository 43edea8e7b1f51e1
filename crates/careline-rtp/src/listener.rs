// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-call UDP listener lifecycle.
//!
//! [`ListenerManager`] owns one socket per active call. Each socket runs a
//! receive task that parses datagrams, updates counters, and hands payloads
//! to the media relay through a bounded queue with `try_send`, so a slow
//! transcription sink drops packets instead of starving the socket.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use careline_config::model::ListenerConfig;
use careline_core::CarelineError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::packet;
use crate::registry::{ListenerEntry, ListenerId, ListenerRegistry, ListenerStats};
use crate::relay::MediaEvent;

/// Largest datagram read in one call.
const MAX_DATAGRAM: usize = 2048;

/// Returned by [`ListenerManager::start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerHandle {
    pub id: ListenerId,
    /// Actual bound port (differs from the requested one only when 0 was requested).
    pub port: u16,
    pub call_id: String,
    pub channel_id: String,
}

/// Read-only view of one listener.
#[derive(Debug, Clone, Serialize)]
pub struct ListenerSnapshot {
    pub port: u16,
    pub call_id: String,
    pub channel_id: String,
    pub packets: u64,
    pub bytes: u64,
    pub malformed: u64,
    pub dropped: u64,
    pub started_at: DateTime<Utc>,
    pub last_activity: Option<DateTime<Utc>>,
    pub open: bool,
}

/// Per-listener entry of a [`HealthReport`].
#[derive(Debug, Clone, Serialize)]
pub struct ListenerAge {
    pub port: u16,
    pub call_id: String,
    pub age_secs: i64,
    /// Seconds since the last valid packet, or since start if none arrived.
    pub idle_secs: i64,
    pub stale: bool,
}

/// Result of [`ListenerManager::health_check`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// False when at least one listener is stale.
    pub healthy: bool,
    pub stale_after_secs: u64,
    pub listeners: Vec<ListenerAge>,
}

/// Owns every per-call media listener in the process.
pub struct ListenerManager {
    config: ListenerConfig,
    registry: RwLock<ListenerRegistry>,
    /// Serializes `start` from availability check to registration.
    bind_lock: Mutex<()>,
    media_tx: mpsc::Sender<MediaEvent>,
    next_id: AtomicU64,
}

impl ListenerManager {
    /// Create an empty manager. Received media is queued on `media_tx`.
    pub fn new(config: ListenerConfig, media_tx: mpsc::Sender<MediaEvent>) -> Self {
        Self {
            config,
            registry: RwLock::new(ListenerRegistry::new()),
            bind_lock: Mutex::new(()),
            media_tx,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Bind a listener on `port` for `call_id`.
    ///
    /// Re-starting the same call on the same port returns the existing
    /// handle. Port 0 asks the OS for an ephemeral port.
    pub async fn start(
        &self,
        port: u16,
        call_id: &str,
        channel_id: &str,
    ) -> Result<ListenerHandle, CarelineError> {
        // Held until the entry is registered, so a losing start sees the
        // winner in the registry rather than an OS bind failure.
        let _binding = self.bind_lock.lock().await;
        if let Some(existing) = check_available(&self.read(), port, call_id)? {
            return Ok(existing);
        }

        let socket = UdpSocket::bind((self.config.bind_address.as_str(), port))
            .await
            .map_err(|source| CarelineError::Bind { port, source })?;
        let bound_port = socket
            .local_addr()
            .map_err(|source| CarelineError::Bind { port, source })?
            .port();

        let mut registry = self.write();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let stats = Arc::new(ListenerStats::new());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(receive_loop(
            socket,
            Arc::from(call_id),
            Arc::clone(&stats),
            self.media_tx.clone(),
            cancel.clone(),
        ));

        let entry = ListenerEntry {
            id,
            port: bound_port,
            call_id: call_id.to_string(),
            channel_id: channel_id.to_string(),
            started_at: Utc::now(),
            stats,
            cancel,
            task: Some(task),
        };
        let handle = handle_of(&entry);
        if let Err(rejected) = registry.insert(entry) {
            rejected.cancel.cancel();
            return Err(CarelineError::Internal(format!(
                "listener registry rejected port {bound_port} for call `{call_id}`"
            )));
        }
        careline_prometheus::set_active_listeners(registry.len());

        info!(port = bound_port, call_id, channel_id, "media listener started");
        Ok(handle)
    }

    /// Release the listener owned by `call_id`.
    ///
    /// Returns `false` when no listener exists; a stop racing a call end is
    /// expected and not an error. The socket is closed before this returns.
    pub async fn stop(&self, call_id: &str) -> bool {
        let entry = {
            let mut registry = self.write();
            let entry = registry.remove_by_call(call_id);
            careline_prometheus::set_active_listeners(registry.len());
            entry
        };

        match entry {
            Some(entry) => {
                let port = entry.port;
                self.shutdown_entry(entry).await;
                info!(port, call_id, "media listener stopped");
                true
            }
            None => {
                debug!(call_id, "no media listener to stop");
                false
            }
        }
    }

    /// Stop every listener. Used at process shutdown.
    pub async fn stop_all(&self) -> usize {
        let entries = {
            let mut registry = self.write();
            let entries = registry.drain();
            careline_prometheus::set_active_listeners(0);
            entries
        };
        let count = entries.len();
        for entry in entries {
            self.shutdown_entry(entry).await;
        }
        if count > 0 {
            info!(count, "all media listeners stopped");
        }
        count
    }

    /// Snapshot of the listener bound to `port`.
    pub fn status(&self, port: u16) -> Option<ListenerSnapshot> {
        self.read().by_port(port).map(snapshot_of)
    }

    /// Snapshot of the listener owned by `call_id`.
    pub fn get_by_call(&self, call_id: &str) -> Option<ListenerSnapshot> {
        self.read().by_call(call_id).map(snapshot_of)
    }

    /// Snapshots of every listener, ordered by port.
    pub fn list(&self) -> Vec<ListenerSnapshot> {
        let mut snapshots: Vec<_> = self.read().iter().map(snapshot_of).collect();
        snapshots.sort_by_key(|s| s.port);
        snapshots
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Report listeners idle beyond the staleness threshold. Never stops anything.
    pub fn health_check(&self) -> HealthReport {
        self.health_at(Utc::now())
    }

    /// [`health_check`](Self::health_check) evaluated at a given instant.
    pub fn health_at(&self, now: DateTime<Utc>) -> HealthReport {
        let threshold = i64::try_from(self.config.stale_after_secs).unwrap_or(i64::MAX);
        let mut listeners: Vec<ListenerAge> = self
            .read()
            .iter()
            .map(|entry| {
                let last = entry.stats.last_activity().unwrap_or(entry.started_at);
                let idle_secs = (now - last).num_seconds().max(0);
                ListenerAge {
                    port: entry.port,
                    call_id: entry.call_id.clone(),
                    age_secs: (now - entry.started_at).num_seconds().max(0),
                    idle_secs,
                    stale: idle_secs > threshold,
                }
            })
            .collect();
        listeners.sort_by_key(|l| l.port);

        HealthReport {
            healthy: listeners.iter().all(|l| !l.stale),
            stale_after_secs: self.config.stale_after_secs,
            listeners,
        }
    }

    async fn shutdown_entry(&self, mut entry: ListenerEntry) {
        entry.cancel.cancel();
        if let Some(task) = entry.task.take() {
            if let Err(e) = task.await {
                warn!(port = entry.port, error = %e, "media listener task ended abnormally");
            }
        }
        entry.stats.close();

        let closed = MediaEvent::Closed {
            call_id: entry.call_id,
        };
        match self.media_tx.try_send(closed) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => {
                // Queue behind pending audio without holding up the caller.
                let tx = self.media_tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(event).await;
                });
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ListenerRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ListenerRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `Ok(Some)` for an idempotent re-start, `Ok(None)` when free to bind.
fn check_available(
    registry: &ListenerRegistry,
    port: u16,
    call_id: &str,
) -> Result<Option<ListenerHandle>, CarelineError> {
    if let Some(owned) = registry.by_call(call_id) {
        if port == 0 || owned.port == port {
            return Ok(Some(handle_of(owned)));
        }
        return Err(CarelineError::CallAlreadyBound {
            call_id: call_id.to_string(),
            port: owned.port,
        });
    }
    if port != 0 {
        if let Some(holder) = registry.by_port(port) {
            return Err(CarelineError::PortConflict {
                port,
                call_id: holder.call_id.clone(),
            });
        }
    }
    Ok(None)
}

fn handle_of(entry: &ListenerEntry) -> ListenerHandle {
    ListenerHandle {
        id: entry.id,
        port: entry.port,
        call_id: entry.call_id.clone(),
        channel_id: entry.channel_id.clone(),
    }
}

fn snapshot_of(entry: &ListenerEntry) -> ListenerSnapshot {
    let stats = &entry.stats;
    ListenerSnapshot {
        port: entry.port,
        call_id: entry.call_id.clone(),
        channel_id: entry.channel_id.clone(),
        packets: stats.packets.load(Ordering::Relaxed),
        bytes: stats.bytes.load(Ordering::Relaxed),
        malformed: stats.malformed.load(Ordering::Relaxed),
        dropped: stats.dropped.load(Ordering::Relaxed),
        started_at: entry.started_at,
        last_activity: stats.last_activity(),
        open: stats.is_open(),
    }
}

async fn receive_loop(
    socket: UdpSocket,
    call_id: Arc<str>,
    stats: Arc<ListenerStats>,
    media_tx: mpsc::Sender<MediaEvent>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, _peer)) => handle_datagram(&buf[..len], &call_id, &stats, &media_tx),
                Err(e) => {
                    // ICMP errors from a previous send surface here on some platforms.
                    warn!(call_id = %call_id, error = %e, "media socket receive error");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            },
        }
    }
    stats.close();
}

fn handle_datagram(
    datagram: &[u8],
    call_id: &Arc<str>,
    stats: &ListenerStats,
    media_tx: &mpsc::Sender<MediaEvent>,
) {
    let packet = match packet::parse(datagram) {
        Ok(packet) => packet,
        Err(reason) => {
            stats.malformed.fetch_add(1, Ordering::Relaxed);
            careline_prometheus::record_rtp_malformed();
            trace!(call_id = %call_id, %reason, "dropping malformed datagram");
            return;
        }
    };

    stats.packets.fetch_add(1, Ordering::Relaxed);
    stats
        .bytes
        .fetch_add(datagram.len() as u64, Ordering::Relaxed);
    stats.touch(Utc::now());
    careline_prometheus::record_rtp_packet();

    let event = MediaEvent::Audio {
        call_id: Arc::clone(call_id),
        chunk: packet.to_chunk(),
    };
    if media_tx.try_send(event).is_err() {
        stats.dropped.fetch_add(1, Ordering::Relaxed);
        careline_prometheus::record_rtp_dropped();
    }
}
