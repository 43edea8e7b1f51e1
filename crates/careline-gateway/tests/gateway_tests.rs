// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use careline_calls::{
    CallEngine, Collaborators, EngineSettings, FinalizationOrchestrator, FinalizerSettings,
};
use careline_config::CarelineConfig;
use careline_config::model::ListenerConfig;
use careline_core::types::{CallStatus, Conversation};
use careline_emergency::{EmergencyDetector, PhraseRegistry};
use careline_gateway::{GatewayState, build_router};
use careline_rtp::{ListenerManager, MediaRelay, media_channel};
use careline_telephony::{SIGNATURE_HEADER, compute_signature};
use careline_test_utils::{
    InMemoryStore, MockTelephony, RecordingAlertSink, RecordingTranscription, patient,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const TOKEN: &str = "test-token";
const AUTH_TOKEN: &str = "tw-auth-token";

struct Harness {
    app: Router,
    engine: Arc<CallEngine>,
    alerts: Arc<RecordingAlertSink>,
    callback_url: String,
    relay_cancel: CancellationToken,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.relay_cancel.cancel();
    }
}

fn free_port() -> u16 {
    std::net::UdpSocket::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

async fn harness_with(validate_signatures: bool, metrics: bool) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    store.add_patient(patient("p-en", "en"));

    let telephony = Arc::new(MockTelephony::new());
    let alerts = Arc::new(RecordingAlertSink::new());
    let transcription = Arc::new(RecordingTranscription::new());

    let start = free_port().min(65535 - 20);
    let mut config = CarelineConfig::default();
    config.gateway.bearer_token = Some(TOKEN.to_string());
    config.gateway.public_base_url = "https://careline.example".to_string();
    config.telephony.auth_token = Some(AUTH_TOKEN.to_string());
    config.telephony.validate_signatures = validate_signatures;
    config.listener = ListenerConfig {
        bind_address: "127.0.0.1".to_string(),
        port_range_start: start,
        port_range_end: start + 20,
        ..ListenerConfig::default()
    };

    let (media_tx, media_rx) = media_channel(64);
    let relay_cancel = CancellationToken::new();
    tokio::spawn(MediaRelay::new(transcription, media_rx).run(relay_cancel.clone()));
    let listeners = Arc::new(ListenerManager::new(config.listener.clone(), media_tx));

    let registry = PhraseRegistry::load(store.clone()).await.unwrap();
    registry.seed_builtin_if_empty().await.unwrap();
    let registry = Arc::new(registry);
    let detector = Arc::new(EmergencyDetector::new(registry.clone()));

    let finalizer = Arc::new(FinalizationOrchestrator::new(
        store.clone(),
        None,
        FinalizerSettings {
            request_timeout: Duration::from_millis(200),
            max_retries: 0,
            retry_backoff: Duration::from_millis(1),
            fraud_min_messages: 5,
        },
    ));

    let engine = Arc::new(CallEngine::new(
        EngineSettings::from_config(&config),
        Collaborators {
            store: store.clone(),
            directory: store.clone(),
            telephony,
            alerts: alerts.clone(),
        },
        listeners,
        detector,
        finalizer,
    ));

    let render: Option<Arc<dyn Fn() -> String + Send + Sync>> = if metrics {
        Some(Arc::new(|| "careline_calls_total 1\n".to_string()))
    } else {
        None
    };
    let state = GatewayState::new(&config, engine.clone(), registry, render);
    let callback_url = state.webhook.callback_url.clone();

    Harness {
        app: build_router(state),
        engine,
        alerts,
        callback_url,
        relay_cancel,
    }
}

async fn harness() -> Harness {
    harness_with(false, false).await
}

impl Harness {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    async fn api(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {TOKEN}"));
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn callback(&self, form: &[(&str, &str)], signature: Option<&str>) -> (StatusCode, Value) {
        let body = serde_urlencoded::to_string(form).unwrap();
        let mut builder = Request::builder()
            .method("POST")
            .uri("/v1/telephony/status")
            .header("content-type", "application/x-www-form-urlencoded");
        if let Some(sig) = signature {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    async fn initiate(&self) -> Conversation {
        let (status, body) = self
            .api(
                "POST",
                "/v1/calls",
                Some(json!({"patient_id": "p-en", "agent_id": "caregiver-1"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        serde_json::from_value(body).unwrap()
    }
}

fn signed(url: &str, form: &[(&str, &str)]) -> String {
    let params: Vec<(String, String)> = form
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    compute_signature(AUTH_TOKEN, url, &params).unwrap()
}

// --- Auth and public routes ---

#[tokio::test]
async fn api_requires_bearer_token() {
    let h = harness().await;
    let request = Request::builder()
        .uri("/v1/listeners")
        .body(Body::empty())
        .unwrap();
    let (status, _) = h.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/v1/listeners")
        .header("authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = h.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_is_public() {
    let h = harness().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = h.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["active_listeners"], 0);
}

#[tokio::test]
async fn metrics_served_only_when_enabled() {
    let h = harness().await;
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let (status, _) = h.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let h = harness_with(false, true).await;
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let (status, body) = h.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("careline_calls_total"));
}

// --- Calls ---

#[tokio::test]
async fn initiate_and_fetch_call() {
    let h = harness().await;
    let call = h.initiate().await;
    assert_eq!(call.call_status, CallStatus::Initiated);
    assert!(call.call_sid.is_some());

    let (status, body) = h.api("GET", &format!("/v1/calls/{}", call.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], call.id.as_str());

    // Lookup by gateway sid resolves to the same conversation.
    let sid = call.call_sid.unwrap();
    let (status, body) = h.api("GET", &format!("/v1/calls/{sid}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], call.id.as_str());
}

#[tokio::test]
async fn unknown_patient_and_call_are_404() {
    let h = harness().await;
    let (status, body) = h
        .api(
            "POST",
            "/v1/calls",
            Some(json!({"patient_id": "nobody", "agent_id": "caregiver-1"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nobody"));

    let (status, _) = h.api("GET", "/v1/calls/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_updates_validate_input() {
    let h = harness().await;
    let call = h.initiate().await;
    let uri = format!("/v1/calls/{}/status", call.id);

    let (status, body) = h.api("POST", &uri, Some(json!({"status": "teleported"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("teleported"));

    let (status, body) = h.api("POST", &uri, Some(json!({"status": "ringing"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["call_status"], "ringing");

    // Ending without an outcome is rejected.
    let end_uri = format!("/v1/calls/{}/end", call.id);
    let (status, _) = h.api("POST", &end_uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = h
        .api("POST", &end_uri, Some(json!({"outcome": "no-answer", "notes": "voicemail"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["call_status"], "ended");
    assert_eq!(body["call_outcome"], "no-answer");
}

#[tokio::test]
async fn utterances_detect_emergencies() {
    let h = harness().await;
    let call = h.initiate().await;
    for s in ["ringing", "answered", "connected"] {
        let (status, _) = h
            .api("POST", &format!("/v1/calls/{}/status", call.id), Some(json!({"status": s})))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let uri = format!("/v1/calls/{}/utterances", call.id);
    let (status, body) = h
        .api("POST", &uri, Some(json!({"role": "patient", "text": "I think I'm having a heart attack"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["detection"]["is_emergency"], true);
    assert_eq!(body["detection"]["category"], "cardiac");

    let signals = h.alerts.wait_for(1, Duration::from_secs(2)).await;
    assert_eq!(signals.len(), 1);

    let (status, body) = h
        .api("GET", &format!("/v1/calls/{}/messages", call.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);

    let (status, body) = h.api("GET", "/v1/listeners", None).await;
    assert_eq!(status, StatusCode::OK);
    let listeners = body["listeners"].as_array().unwrap();
    assert_eq!(listeners.len(), 1);
    let port = listeners[0]["port"].as_u64().unwrap();

    let (status, body) = h.api("GET", &format!("/v1/listeners/{port}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["call_id"], call.id.as_str());

    let (status, body) = h.api("GET", "/v1/listeners/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["listeners"].as_array().unwrap().len(), 1);

    h.engine.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn unknown_listener_port_is_404() {
    let h = harness().await;
    let (status, _) = h.api("GET", "/v1/listeners/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patient_history_lists_calls() {
    let h = harness().await;
    h.initiate().await;
    h.initiate().await;

    let (status, body) = h.api("GET", "/v1/patients/p-en/calls", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["patient_id"], "p-en");
    assert_eq!(body["calls"].as_array().unwrap().len(), 2);

    let (status, _) = h.api("GET", "/v1/patients/nobody/calls", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// --- Status webhook ---

#[tokio::test]
async fn webhook_drives_lifecycle() {
    let h = harness().await;
    let call = h.initiate().await;
    let sid = call.call_sid.clone().unwrap();

    let (status, body) = h
        .callback(&[("CallSid", sid.as_str()), ("CallStatus", "initiated")], None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");

    let (status, body) = h
        .callback(&[("CallSid", sid.as_str()), ("CallStatus", "ringing")], None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["call_status"], "ringing");

    let (status, body) = h
        .callback(&[("CallSid", sid.as_str()), ("CallStatus", "in-progress")], None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["call_status"], "connected");
    assert!(h.engine.listeners().get_by_call(&call.id).is_some());

    // A late ringing callback is acknowledged but changes nothing.
    let (status, body) = h
        .callback(&[("CallSid", sid.as_str()), ("CallStatus", "ringing")], None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");

    let (status, body) = h
        .callback(
            &[("CallSid", sid.as_str()), ("CallStatus", "completed"), ("CallDuration", "42")],
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["call_status"], "ended");
    assert!(h.engine.listeners().get_by_call(&call.id).is_none());

    h.engine.finalizer().wait_idle().await;
    let stored = h.engine.get_call(&call.id).await.unwrap();
    assert_eq!(stored.call_status, CallStatus::Completed);
}

#[tokio::test]
async fn webhook_rejects_unknown_status_and_call() {
    let h = harness().await;
    let call = h.initiate().await;
    let sid = call.call_sid.unwrap();

    let (status, _) = h
        .callback(&[("CallSid", sid.as_str()), ("CallStatus", "on-hold")], None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = h
        .callback(&[("CallSid", "CAunknown"), ("CallStatus", "ringing")], None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h.callback(&[("CallStatus", "ringing")], None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn webhook_checks_signatures_when_enabled() {
    let h = harness_with(true, false).await;
    let call = h.initiate().await;
    let sid = call.call_sid.unwrap();
    let form = [("CallSid", sid.as_str()), ("CallStatus", "ringing")];

    let (status, body) = h.callback(&form, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("signature"));

    let (status, _) = h.callback(&form, Some("bm90LXRoZS1zaWduYXR1cmU=")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let signature = signed(&h.callback_url, &form);
    let (status, body) = h.callback(&form, Some(&signature)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["call_status"], "ringing");
}

// --- Emergency phrases ---

#[tokio::test]
async fn phrase_crud_bumps_version() {
    let h = harness().await;
    let (status, body) = h.api("GET", "/v1/emergency/phrases", None).await;
    assert_eq!(status, StatusCode::OK);
    let version = body["version"].as_u64().unwrap();
    assert!(!body["phrases"].as_array().unwrap().is_empty());

    let (status, body) = h
        .api(
            "PUT",
            "/v1/emergency/phrases/custom-ankles",
            Some(json!({
                "phrase": "swollen ankles",
                "language": "en",
                "severity": "medium",
                "category": "symptom"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["id"], "custom-ankles");
    assert_eq!(body["severity"], "MEDIUM");

    let (_, body) = h.api("GET", "/v1/emergency/phrases", None).await;
    assert!(body["version"].as_u64().unwrap() > version);

    let (status, body) = h
        .api(
            "POST",
            "/v1/emergency/matches",
            Some(json!({"text": "I noticed swollen ankles this morning", "language": "en"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detection"]["phrase_id"], "custom-ankles");
    assert_eq!(body["matches"].as_array().unwrap().len(), 1);

    let (status, _) = h.api("DELETE", "/v1/emergency/phrases/custom-ankles", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = h.api("DELETE", "/v1/emergency/phrases/custom-ankles", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_phrase_is_rejected() {
    let h = harness().await;
    let (status, _) = h
        .api(
            "PUT",
            "/v1/emergency/phrases/bad",
            Some(json!({
                "phrase": "x",
                "language": "en",
                "severity": "apocalyptic",
                "category": "other"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn matches_are_language_scoped() {
    let h = harness().await;
    let (status, body) = h
        .api(
            "POST",
            "/v1/emergency/matches",
            Some(json!({"text": "heart attack", "language": "xx"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detection"]["is_emergency"], false);
    assert!(body["matches"].as_array().unwrap().is_empty());
}
