// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0
#![allow(missing_docs, dead_code)]

//! Upstream provider fixtures
//!
//! Each provider is backed by its own `MockServer` so tests can script
//! failures per provider and count the calls each one received.

use std::{num::NonZeroU32, time::Duration};

use balancer::{BalancerConfig, NonEmptyString, ProviderConfig};
use serde_json::{Value, json};
use url::Url;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method},
};

/// Build a provider entry pointing at a mock server
pub fn provider(name: &str, server: &MockServer, max_errors: u32, priority: u32) -> ProviderConfig {
    ProviderConfig::new(
        NonEmptyString::new(name).unwrap(),
        Url::parse(&server.uri()).unwrap(),
        NonZeroU32::new(50).unwrap(),
        NonZeroU32::new(max_errors).unwrap(),
        priority,
    )
}

/// Default settings with delays shrunk so retry paths finish quickly
pub fn fast_config(providers: Vec<ProviderConfig>) -> BalancerConfig {
    BalancerConfig {
        request_timeout: Duration::from_millis(500),
        probe_timeout: Duration::from_millis(500),
        backoff_base: Duration::from_millis(10),
        backoff_max: Duration::from_millis(20),
        rate_limit_cooldown_min: Duration::from_millis(5),
        rate_limit_cooldown_max: Duration::from_millis(10),
        ..BalancerConfig::with_providers(providers)
    }
}

/// A JSON-RPC success body
pub fn rpc_result(result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": 1, "result": result})
}

/// A JSON-RPC error body
pub fn rpc_error(code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": 1, "error": {"code": code, "message": message}})
}

/// Answer `rpc_method` with `body`, checking the outbound headers
pub async fn mount_rpc(server: &MockServer, rpc_method: &str, body: Value) {
    Mock::given(method("POST"))
        .and(header("content-type", "application/json"))
        .and(header("accept", "application/json"))
        .and(body_partial_json(json!({"method": rpc_method})))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Answer every call with a bare HTTP status
pub async fn mount_status(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(status).set_body_string("upstream unavailable"))
        .mount(server)
        .await;
}

/// Number of requests a mock server received
pub async fn received(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map_or(0, |requests| requests.len())
}
