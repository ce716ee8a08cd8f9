// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics module
//!
//! Provides global metrics using the default Prometheus registry via macros and
//! an Axum-compatible metrics handler. Provider, cache and session gauges are
//! refreshed from a balancer snapshot on every scrape.

use std::sync::LazyLock;

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use balancer::{BalancerSnapshot, CacheStats};
use prometheus::{
    Encoder, Gauge, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, TextEncoder,
    register_gauge, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec,
};
use shared_types::MethodClass;
use tracing::error;

use crate::state::ServerState;

/// Label used for methods outside the well-known namespaces
const OTHER_METHOD: &str = "other";

const KNOWN_NAMESPACES: &[&str] = &["eth_", "net_", "web3_", "debug_", "trace_", "txpool_"];

const MAX_METHOD_LABEL_LEN: usize = 64;

/// Inbound requests, labeled by method and outcome
pub static RPC_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "rpc_balancer_requests_total",
        "Total number of JSON-RPC requests, labeled by method and outcome",
        &["method", "outcome"]
    )
    .expect("Failed to create rpc_balancer_requests_total counter vec")
});

/// Histogram of end-to-end request durations in seconds
pub static RPC_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "rpc_balancer_request_duration_seconds",
        "JSON-RPC request durations in seconds, retries and backoff included",
        &["method"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to create request duration histogram")
});

/// Current error count per provider
pub static PROVIDER_ERRORS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        "rpc_balancer_provider_error_count",
        "Current error count of each provider",
        &["provider"]
    )
    .expect("Failed to create provider error gauge")
});

/// Whether a provider is under its error budget (1) or not (0)
pub static PROVIDER_AVAILABLE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        "rpc_balancer_provider_available",
        "1 when the provider is under its error budget",
        &["provider"]
    )
    .expect("Failed to create provider availability gauge")
});

/// Last observed chain height per provider
pub static PROVIDER_BLOCK_HEIGHT: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        "rpc_balancer_provider_block_height",
        "Last block height reported by each provider's health probe",
        &["provider"]
    )
    .expect("Failed to create provider block height gauge")
});

/// Cache size gauge
pub static CACHE_SIZE: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(
        "rpc_balancer_cache_entries_count",
        "Current number of entries in the response cache"
    )
    .expect("Failed to create cache size gauge")
});

/// Cache hit rate gauge
pub static CACHE_HIT_RATE: LazyLock<Gauge> = LazyLock::new(|| {
    register_gauge!(
        "rpc_balancer_cache_hit_rate",
        "Cache hit rate as a ratio (0.0 to 1.0)"
    )
    .expect("Failed to create cache hit rate gauge")
});

/// Live sticky sessions
pub static SESSIONS: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(
        "rpc_balancer_sessions_count",
        "Current number of client sessions"
    )
    .expect("Failed to create session gauge")
});

/// Bounded label for a client-supplied method name
pub fn method_label(method: &str) -> &str {
    let known = MethodClass::of(method) != MethodClass::Standard
        || (method.len() <= MAX_METHOD_LABEL_LEN
            && KNOWN_NAMESPACES.iter().any(|ns| method.starts_with(ns))
            && method.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_'));
    if known { method } else { OTHER_METHOD }
}

/// Count a request and observe its duration
///
/// # Arguments
/// * `method` - JSON-RPC method name
/// * `outcome` - `success`, `rpc_error`, `cache_hit` or `failed`
/// * `duration_secs` - Time spent serving the request
pub fn record_request(method: &str, outcome: &str, duration_secs: f64) {
    let method = method_label(method);
    RPC_REQUESTS.with_label_values(&[method, outcome]).inc();
    RPC_REQUEST_DURATION
        .with_label_values(&[method])
        .observe(duration_secs);
}

/// Copy a balancer snapshot into the gauges
pub fn update_balancer_metrics(snapshot: &BalancerSnapshot, cache: &CacheStats) {
    for provider in &snapshot.providers {
        let name = provider.name.as_str();
        PROVIDER_ERRORS
            .with_label_values(&[name])
            .set(i64::from(provider.error_count));
        PROVIDER_AVAILABLE
            .with_label_values(&[name])
            .set(i64::from(provider.available));
        if let Some(height) = provider.block_height {
            PROVIDER_BLOCK_HEIGHT
                .with_label_values(&[name])
                .set(i64::try_from(height).unwrap_or(i64::MAX));
        }
    }
    CACHE_SIZE.set(i64::try_from(cache.entry_count).unwrap_or(i64::MAX));
    CACHE_HIT_RATE.set(cache.hit_rate);
    SESSIONS.set(i64::try_from(snapshot.sessions).unwrap_or(i64::MAX));
}

/// Axum handler that exports metrics in Prometheus text format
pub async fn metrics_handler(State(state): State<ServerState>) -> Response {
    let balancer = state.balancer();
    update_balancer_metrics(&balancer.snapshot(), &balancer.cache().stats());

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_labels_are_bounded() {
        assert_eq!(method_label("eth_blockNumber"), "eth_blockNumber");
        assert_eq!(method_label("eth_getLogs"), "eth_getLogs");
        assert_eq!(method_label("net_version"), "net_version");
        assert_eq!(method_label("made_up_method"), OTHER_METHOD);
        assert_eq!(method_label("eth_bad label"), OTHER_METHOD);
        assert_eq!(method_label(&format!("eth_{}", "x".repeat(80))), OTHER_METHOD);
    }

    #[test]
    fn request_counter_increments() {
        let before = RPC_REQUESTS
            .with_label_values(&["eth_chainId", "success"])
            .get();
        record_request("eth_chainId", "success", 0.01);
        let after = RPC_REQUESTS
            .with_label_values(&["eth_chainId", "success"])
            .get();
        assert!(after > before);
    }
}
