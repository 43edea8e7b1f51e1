// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. With no recorder installed every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Careline metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("careline_calls_initiated_total", "Outbound calls placed");
    describe_counter!(
        "careline_call_transitions_total",
        "Applied call lifecycle transitions by target status"
    );
    describe_counter!("careline_calls_ended_total", "Ended calls by outcome");
    describe_histogram!(
        "careline_call_duration_seconds",
        "Recorded call duration in seconds"
    );
    describe_gauge!("careline_active_listeners", "Currently bound media listeners");
    describe_counter!("careline_rtp_packets_total", "Valid media packets received");
    describe_counter!(
        "careline_rtp_malformed_total",
        "Media datagrams dropped as malformed"
    );
    describe_counter!(
        "careline_rtp_dropped_total",
        "Media packets dropped because the relay queue was full"
    );
    describe_counter!(
        "careline_emergency_detections_total",
        "Utterances classified as emergencies"
    );
    describe_counter!(
        "careline_finalization_total",
        "Post-call analysis attempts by kind and result"
    );
    describe_histogram!(
        "careline_analysis_latency_seconds",
        "AI analysis request latency in seconds"
    );
}

/// Record an outbound call placement.
pub fn record_call_initiated() {
    metrics::counter!("careline_calls_initiated_total").increment(1);
}

/// Record an applied lifecycle transition.
pub fn record_transition(to: &str) {
    metrics::counter!("careline_call_transitions_total", "to" => to.to_string()).increment(1);
}

/// Record a call reaching `ended`.
pub fn record_call_ended(outcome: &str, duration_secs: i64) {
    metrics::counter!("careline_calls_ended_total", "outcome" => outcome.to_string()).increment(1);
    metrics::histogram!("careline_call_duration_seconds").record(duration_secs.max(0) as f64);
}

/// Set the number of bound listeners.
pub fn set_active_listeners(count: usize) {
    metrics::gauge!("careline_active_listeners").set(count as f64);
}

/// Record a valid media packet.
pub fn record_rtp_packet() {
    metrics::counter!("careline_rtp_packets_total").increment(1);
}

/// Record a malformed datagram.
pub fn record_rtp_malformed() {
    metrics::counter!("careline_rtp_malformed_total").increment(1);
}

/// Record a packet dropped by the non-blocking relay handoff.
pub fn record_rtp_dropped() {
    metrics::counter!("careline_rtp_dropped_total").increment(1);
}

/// Record an emergency detection.
pub fn record_emergency(severity: &str, language: &str) {
    metrics::counter!(
        "careline_emergency_detections_total",
        "severity" => severity.to_string(),
        "language" => language.to_string()
    )
    .increment(1);
}

/// Record the result of one finalization analysis step.
pub fn record_finalization(kind: &'static str, result: &'static str) {
    metrics::counter!("careline_finalization_total", "kind" => kind, "result" => result)
        .increment(1);
}

/// Record analysis request latency.
pub fn record_analysis_latency(kind: &'static str, seconds: f64) {
    metrics::histogram!("careline_analysis_latency_seconds", "kind" => kind).record(seconds);
}
