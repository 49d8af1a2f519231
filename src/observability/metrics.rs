//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by route, upstream, tenant, status
//! - `edge_request_duration_seconds` (histogram): time to response head, by route
//! - `edge_upstream_errors_total` (counter): upstream failures by upstream, kind
//! - `edge_upgraded_connections` (gauge): spliced connections currently open
//! - `edge_config_reloads_total` (counter): reload attempts by result
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exposition on its own listener, off by default

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(route: &str, upstream: &str, tenant: &str, status: u16, start: Instant) {
    counter!(
        "edge_requests_total",
        "route" => route.to_string(),
        "upstream" => upstream.to_string(),
        "tenant" => tenant.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("edge_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(upstream: &str, kind: &'static str) {
    counter!(
        "edge_upstream_errors_total",
        "upstream" => upstream.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn upgraded_connection_opened() {
    gauge!("edge_upgraded_connections").increment(1.0);
}

pub fn upgraded_connection_closed() {
    gauge!("edge_upgraded_connections").decrement(1.0);
}

pub fn record_config_reload(success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("edge_config_reloads_total", "result" => result).increment(1);
}
