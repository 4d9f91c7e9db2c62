//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_rpc_calls_total` (counter): calls by method and outcome
//! - `gateway_supervisor_restarts_total` (counter): serve attempts that crashed
//! - `gateway_done_initializing` (gauge): 1 once the controller has started
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the global recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_call(method: &'static str, outcome: &'static str) {
    ::metrics::counter!("gateway_rpc_calls_total", "method" => method, "outcome" => outcome)
        .increment(1);
}

pub fn record_restart() {
    ::metrics::counter!("gateway_supervisor_restarts_total").increment(1);
}

pub fn record_done_initializing(done: bool) {
    ::metrics::gauge!("gateway_done_initializing").set(if done { 1.0 } else { 0.0 });
}
