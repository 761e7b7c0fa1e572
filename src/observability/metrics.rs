//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define session and request metrics
//! - Expose a Prometheus-compatible scrape endpoint
//! - Provide the `Telemetry` seam sessions and lifecycles report through
//!
//! # Metrics
//! - `h2_session_requests_total` (counter): finished requests by peer, method, route, status
//! - `h2_session_request_duration_seconds` (histogram): request latency
//! - `h2_session_active_requests` (gauge): lifecycles in flight
//! - `h2_session_active_sessions` (gauge): open sessions
//! - `h2_session_duration_seconds` (histogram): session lifetime
//! - `h2_session_requests_per_session` (histogram): requests made by a session
//!
//! # Design Decisions
//! - Emission is fire-and-forget; nothing reads results back
//! - Labels: protocol, peer host, peer port, method, route, status or error kind

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::http::Method;
use crate::session::{Origin, Protocol};

/// Peer labels attached to every observation of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerLabels {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
}

impl PeerLabels {
    pub fn new(protocol: Protocol, origin: &Origin) -> Self {
        Self {
            protocol,
            host: origin.host().to_string(),
            port: origin.port(),
        }
    }
}

/// How a lifecycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A response arrived; carries its status (possibly `-1`).
    Status(i32),
    /// The lifecycle failed; carries the error kind.
    Error(&'static str),
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestOutcome::Status(status) => write!(f, "{}", status),
            RequestOutcome::Error(kind) => f.write_str(kind),
        }
    }
}

/// Sink for session and lifecycle observations.
pub trait Telemetry: Send + Sync {
    fn request_started(&self, peer: &PeerLabels);

    /// Called exactly once per lifecycle, after its terminal transition.
    fn request_finished(
        &self,
        peer: &PeerLabels,
        method: Method,
        route: &str,
        outcome: &RequestOutcome,
        elapsed: Duration,
    );

    fn session_opened(&self, peer: &PeerLabels);

    /// Called exactly once per session, on its first terminal event.
    fn session_closed(&self, peer: &PeerLabels, lifetime: Duration, requests: i64);
}

/// Telemetry through the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsTelemetry;

impl Telemetry for MetricsTelemetry {
    fn request_started(&self, peer: &PeerLabels) {
        record_request_started(peer);
    }

    fn request_finished(
        &self,
        peer: &PeerLabels,
        method: Method,
        route: &str,
        outcome: &RequestOutcome,
        elapsed: Duration,
    ) {
        record_request(peer, method, route, outcome, elapsed);
    }

    fn session_opened(&self, peer: &PeerLabels) {
        record_session_opened(peer);
    }

    fn session_closed(&self, peer: &PeerLabels, lifetime: Duration, requests: i64) {
        record_session_closed(peer, lifetime, requests);
    }
}

/// Telemetry that discards every observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn request_started(&self, _peer: &PeerLabels) {}

    fn request_finished(
        &self,
        _peer: &PeerLabels,
        _method: Method,
        _route: &str,
        _outcome: &RequestOutcome,
        _elapsed: Duration,
    ) {
    }

    fn session_opened(&self, _peer: &PeerLabels) {}

    fn session_closed(&self, _peer: &PeerLabels, _lifetime: Duration, _requests: i64) {}
}

/// Install the Prometheus recorder and its HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    describe_counter!("h2_session_requests_total", "Finished requests");
    describe_histogram!(
        "h2_session_request_duration_seconds",
        metrics::Unit::Seconds,
        "Request duration from stream open to terminal event"
    );
    describe_gauge!("h2_session_active_requests", "Requests in flight");
    describe_gauge!("h2_session_active_sessions", "Open sessions");
    describe_histogram!(
        "h2_session_duration_seconds",
        metrics::Unit::Seconds,
        "Session lifetime"
    );
    describe_histogram!("h2_session_requests_per_session", "Requests made per session");

    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn peer_labels(peer: &PeerLabels) -> [(&'static str, String); 3] {
    [
        ("protocol", peer.protocol.as_str().to_string()),
        ("peer_host", peer.host.clone()),
        ("peer_port", peer.port.to_string()),
    ]
}

pub fn record_request_started(peer: &PeerLabels) {
    gauge!("h2_session_active_requests", &peer_labels(peer)).increment(1.0);
}

pub fn record_request(
    peer: &PeerLabels,
    method: Method,
    route: &str,
    outcome: &RequestOutcome,
    elapsed: Duration,
) {
    let labels = [
        ("protocol", peer.protocol.as_str().to_string()),
        ("peer_host", peer.host.clone()),
        ("peer_port", peer.port.to_string()),
        ("method", method.as_str().to_string()),
        ("route", route.to_string()),
        ("status", outcome.to_string()),
    ];
    histogram!("h2_session_request_duration_seconds", &labels).record(elapsed.as_secs_f64());
    counter!("h2_session_requests_total", &labels).increment(1);
    gauge!("h2_session_active_requests", &peer_labels(peer)).decrement(1.0);
}

pub fn record_session_opened(peer: &PeerLabels) {
    gauge!("h2_session_active_sessions", &peer_labels(peer)).increment(1.0);
}

pub fn record_session_closed(peer: &PeerLabels, lifetime: Duration, requests: i64) {
    let labels = peer_labels(peer);
    histogram!("h2_session_duration_seconds", &labels).record(lifetime.as_secs_f64());
    histogram!("h2_session_requests_per_session", &labels).record(requests as f64);
    gauge!("h2_session_active_sessions", &labels).decrement(1.0);
}
