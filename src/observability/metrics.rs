//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (dispatches, latency, auth decisions, faults)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_dispatch_total` (counter): dispatches by transport, outcome
//! - `gateway_dispatch_duration_seconds` (histogram): latency by transport
//! - `gateway_auth_decisions_total` (counter): authorization results
//! - `gateway_handler_faults_total` (counter): handler faults by topic
//! - `gateway_socket_connections` (gauge): live socket connections
//!
//! # Design Decisions
//! - Fire-and-forget: recording never affects control flow
//! - Without an installed recorder every call is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter");
        }
    }
}

fn describe_metrics() {
    describe_counter!("gateway_dispatch_total", "Dispatched requests and messages");
    describe_histogram!(
        "gateway_dispatch_duration_seconds",
        "Time from route match to rendered outcome"
    );
    describe_counter!("gateway_auth_decisions_total", "Authorization decisions");
    describe_counter!("gateway_handler_faults_total", "Handler errors and panics");
    describe_gauge!("gateway_socket_connections", "Open socket connections");
}

/// Record one dispatch through either transport.
pub fn record_dispatch(transport: &'static str, outcome: &'static str, start: Instant) {
    counter!("gateway_dispatch_total", "transport" => transport, "outcome" => outcome)
        .increment(1);
    histogram!("gateway_dispatch_duration_seconds", "transport" => transport)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_auth_decision(decision: &'static str) {
    counter!("gateway_auth_decisions_total", "decision" => decision).increment(1);
}

pub fn record_handler_fault(topic: &str) {
    counter!("gateway_handler_faults_total", "topic" => topic.to_string()).increment(1);
}

pub fn socket_opened() {
    gauge!("gateway_socket_connections").increment(1.0);
}

pub fn socket_closed() {
    gauge!("gateway_socket_connections").decrement(1.0);
}
