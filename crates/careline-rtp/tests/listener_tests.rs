// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the media listener manager over real loopback sockets.

use std::sync::Arc;
use std::time::Duration;

use careline_config::model::ListenerConfig;
use careline_core::CarelineError;
use careline_rtp::{ListenerManager, ListenerSnapshot, MediaRelay, media_channel};
use careline_test_utils::RecordingTranscription;
use tokio_util::sync::CancellationToken;

fn loopback_config() -> ListenerConfig {
    ListenerConfig {
        bind_address: "127.0.0.1".to_string(),
        ..ListenerConfig::default()
    }
}

fn new_manager(capacity: usize) -> (ListenerManager, tokio::sync::mpsc::Receiver<careline_rtp::MediaEvent>) {
    let (tx, rx) = media_channel(capacity);
    (ListenerManager::new(loopback_config(), tx), rx)
}

fn free_port() -> u16 {
    std::net::UdpSocket::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn rtp(seq: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0x80, 0x00];
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&(u32::from(seq) * 160).to_be_bytes());
    buf.extend_from_slice(&0x0bad_cafe_u32.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

async fn wait_for(
    manager: &ListenerManager,
    call_id: &str,
    done: impl Fn(&ListenerSnapshot) -> bool,
) -> ListenerSnapshot {
    for _ in 0..200 {
        if let Some(snapshot) = manager.get_by_call(call_id) {
            if done(&snapshot) {
                return snapshot;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("listener for {call_id} never reached the expected state");
}

#[tokio::test]
async fn start_then_stop_leaves_no_index_entries() {
    let (manager, _rx) = new_manager(16);
    let port = free_port();

    let handle = manager.start(port, "call-a", "chan-a").await.unwrap();
    assert_eq!(handle.port, port);
    assert!(manager.status(port).is_some());
    assert!(manager.get_by_call("call-a").is_some());

    assert!(manager.stop("call-a").await);
    assert!(manager.status(port).is_none());
    assert!(manager.get_by_call("call-a").is_none());
    assert!(manager.is_empty());
}

#[tokio::test]
async fn port_conflict_then_reuse_after_stop() {
    let (manager, _rx) = new_manager(16);
    let port = free_port();

    manager.start(port, "call-a", "chan-a").await.unwrap();
    let err = manager.start(port, "call-b", "chan-b").await.unwrap_err();
    assert!(
        matches!(err, CarelineError::PortConflict { port: p, ref call_id } if p == port && call_id == "call-a"),
        "got {err:?}"
    );

    assert!(manager.stop("call-a").await);
    let handle = manager.start(port, "call-b", "chan-b").await.unwrap();
    assert_eq!(handle.call_id, "call-b");
    manager.stop_all().await;
}

#[tokio::test]
async fn restart_same_call_and_port_is_idempotent() {
    let (manager, _rx) = new_manager(16);
    let port = free_port();

    let first = manager.start(port, "call-a", "chan-a").await.unwrap();
    let second = manager.start(port, "call-a", "chan-a").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(manager.len(), 1);
    manager.stop_all().await;
}

#[tokio::test]
async fn second_port_for_same_call_is_rejected() {
    let (manager, _rx) = new_manager(16);
    let port = free_port();
    manager.start(port, "call-a", "chan-a").await.unwrap();

    let other = free_port();
    let err = manager.start(other, "call-a", "chan-a").await.unwrap_err();
    assert!(matches!(err, CarelineError::CallAlreadyBound { .. }), "got {err:?}");
    manager.stop_all().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_starts_on_one_port_yield_port_conflict() {
    let (manager, _rx) = new_manager(16);
    let manager = Arc::new(manager);

    for round in 0..8 {
        let port = free_port();
        let mut tasks = Vec::new();
        for n in 0..4 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move {
                let call_id = format!("call-{round}-{n}");
                manager.start(port, &call_id, "chan").await
            }));
        }

        let mut started = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(handle) => {
                    assert_eq!(handle.port, port);
                    started += 1;
                }
                Err(CarelineError::PortConflict { port: p, .. }) => assert_eq!(p, port),
                Err(e) => panic!("round {round}: unexpected error {e:?}"),
            }
        }
        assert_eq!(started, 1, "round {round}");
        manager.stop_all().await;
    }
}

#[tokio::test]
async fn os_bind_failure_surfaces_as_bind_error() {
    let (manager, _rx) = new_manager(16);
    let occupied = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let err = manager.start(port, "call-a", "chan-a").await.unwrap_err();
    assert!(matches!(err, CarelineError::Bind { port: p, .. } if p == port), "got {err:?}");
    assert!(manager.is_empty());
}

#[tokio::test]
async fn stop_unknown_call_returns_false() {
    let (manager, _rx) = new_manager(16);
    assert!(!manager.stop("nope").await);
}

#[tokio::test]
async fn ephemeral_port_is_recorded() {
    let (manager, _rx) = new_manager(16);
    let handle = manager.start(0, "call-a", "chan-a").await.unwrap();
    assert_ne!(handle.port, 0);
    assert_eq!(manager.status(handle.port).unwrap().call_id, "call-a");
    manager.stop_all().await;
}

#[tokio::test]
async fn packets_are_counted_and_relayed() {
    let (tx, rx) = media_channel(64);
    let manager = ListenerManager::new(loopback_config(), tx);
    let sink = Arc::new(RecordingTranscription::new());
    let cancel = CancellationToken::new();
    let relay = tokio::spawn(MediaRelay::new(sink.clone(), rx).run(cancel.clone()));

    let handle = manager.start(0, "call-a", "chan-a").await.unwrap();
    let client = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let target = ("127.0.0.1", handle.port);
    client.send_to(&rtp(1, b"aa"), target).await.unwrap();
    client.send_to(&rtp(2, b"bb"), target).await.unwrap();
    client.send_to(&[0x80, 0x00, 0x01], target).await.unwrap();

    let snapshot = wait_for(&manager, "call-a", |s| s.packets == 2 && s.malformed == 1).await;
    assert_eq!(snapshot.bytes, 28);
    assert!(snapshot.last_activity.is_some());
    assert!(snapshot.open);

    assert!(manager.stop("call-a").await);
    for _ in 0..200 {
        if !sink.closed_calls().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let chunks = sink.chunks("call-a");
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].sequence, 1);
    assert_eq!(chunks[1].payload, b"bb".to_vec());
    assert_eq!(sink.closed_calls(), vec!["call-a".to_string()]);

    cancel.cancel();
    relay.await.unwrap();
}

#[tokio::test]
async fn full_queue_drops_instead_of_blocking() {
    // Capacity 1 and nobody draining the receiver.
    let (manager, _rx) = new_manager(1);
    let handle = manager.start(0, "call-a", "chan-a").await.unwrap();
    let client = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    for seq in 0..4 {
        client
            .send_to(&rtp(seq, b"x"), ("127.0.0.1", handle.port))
            .await
            .unwrap();
    }

    let snapshot = wait_for(&manager, "call-a", |s| s.packets == 4).await;
    assert_eq!(snapshot.dropped, 3);
    manager.stop_all().await;
}

#[tokio::test]
async fn health_reports_stale_without_stopping() {
    let (manager, _rx) = new_manager(16);
    let handle = manager.start(0, "call-a", "chan-a").await.unwrap();

    let fresh = manager.health_check();
    assert!(fresh.healthy);
    assert_eq!(fresh.listeners.len(), 1);

    let later = chrono::Utc::now() + chrono::Duration::seconds(120);
    let report = manager.health_at(later);
    assert!(!report.healthy);
    assert!(report.listeners[0].stale);
    assert!(report.listeners[0].idle_secs >= 119);
    assert_eq!(report.stale_after_secs, 30);

    // Reporting never removes anything.
    assert!(manager.status(handle.port).is_some());
    manager.stop_all().await;
}

#[tokio::test]
async fn stop_all_clears_every_listener() {
    let (manager, _rx) = new_manager(16);
    manager.start(0, "call-a", "chan-a").await.unwrap();
    manager.start(0, "call-b", "chan-b").await.unwrap();
    assert_eq!(manager.list().len(), 2);

    assert_eq!(manager.stop_all().await, 2);
    assert!(manager.is_empty());
    assert!(manager.list().is_empty());
}
