#[cfg(feature = "server")]
use axum::{http::StatusCode, response::IntoResponse};
#[cfg(feature = "server")]
use metrics::counter;
#[cfg(feature = "server")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
#[cfg(feature = "server")]
use std::sync::OnceLock;

#[cfg(feature = "server")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

#[cfg(feature = "server")]
pub fn init_metrics() {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Metrics recorder already initialized");
            }

            // Initialize metrics with zero values
            counter!("whois_gateway_lookups_total", "type" => "DomainInfo").absolute(0);
            counter!("whois_gateway_lookups_total", "type" => "ContactInfo").absolute(0);
            counter!("whois_gateway_cache_hits_total").absolute(0);
            counter!("whois_gateway_cache_misses_total").absolute(0);
            counter!("whois_gateway_upstream_retries_total").absolute(0);
        }
        Err(e) => {
            eprintln!("Failed to install metrics recorder: {}", e);
        }
    }
}

#[cfg(feature = "server")]
pub fn increment_lookups(request_type: &str) {
    counter!("whois_gateway_lookups_total", "type" => request_type.to_string()).increment(1);
}

#[cfg(feature = "server")]
pub fn increment_cache_hits() {
    counter!("whois_gateway_cache_hits_total").increment(1);
}

#[cfg(feature = "server")]
pub fn increment_cache_misses() {
    counter!("whois_gateway_cache_misses_total").increment(1);
}

#[cfg(feature = "server")]
pub fn increment_upstream_retries() {
    counter!("whois_gateway_upstream_retries_total").increment(1);
}

#[cfg(feature = "server")]
pub fn increment_errors(error_type: &str) {
    counter!("whois_gateway_errors_total", "error_type" => error_type.to_string()).increment(1);
}

#[cfg(feature = "server")]
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics not initialized".to_string()),
    }
}

// Library builds without the server feature record nothing
#[cfg(not(feature = "server"))]
pub fn increment_lookups(_request_type: &str) {}

#[cfg(not(feature = "server"))]
pub fn increment_cache_hits() {}

#[cfg(not(feature = "server"))]
pub fn increment_cache_misses() {}

#[cfg(not(feature = "server"))]
pub fn increment_upstream_retries() {}

#[cfg(not(feature = "server"))]
pub fn increment_errors(_error_type: &str) {}
