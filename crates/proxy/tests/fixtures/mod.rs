// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0
#![allow(missing_docs, dead_code)]

//! Proxy test fixtures
//!
//! Starts a real server on an OS-assigned port in front of `MockServer`
//! providers and talks to it with `reqwest`.

use std::{net::SocketAddr, time::Duration};

use balancer::{BalancerConfig, ProviderConfig};
use proxy::{Server, ServerConfig, ShutdownConfig};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method},
};

/// A running proxy
pub struct TestProxy {
    pub addr: SocketAddr,
    pub token: CancellationToken,
    pub client: reqwest::Client,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// POST a JSON-RPC body to `/`
    pub async fn rpc(&self, body: &Value) -> (u16, Value) {
        let response = self
            .client
            .post(self.url("/"))
            .json(body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    /// GET a JSON endpoint
    pub async fn get_json(&self, path: &str) -> (u16, Value) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Provider entry pointing at a mock server
pub fn provider(name: &str, server: &MockServer, max_errors: u32, priority: u32) -> ProviderConfig {
    serde_json::from_value(json!({
        "name": name,
        "url": server.uri(),
        "rate_limit": 50,
        "max_errors": max_errors,
        "priority": priority
    }))
    .unwrap()
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

/// Start a proxy with the given server configuration
pub async fn start_with(config: ServerConfig) -> TestProxy {
    let (addr, token) = Server::new(config, ShutdownConfig::default())
        .unwrap()
        .run_for_testing()
        .await
        .unwrap();
    TestProxy {
        addr,
        token,
        client: reqwest::Client::new(),
    }
}

/// Start a proxy in front of the given providers
pub async fn start(providers: Vec<ProviderConfig>) -> TestProxy {
    start_with(ServerConfig::for_testing(fast_config(providers))).await
}

/// A JSON-RPC request body
pub fn rpc_request(rpc_method: &str, params: Value, id: Value) -> Value {
    json!({"jsonrpc": "2.0", "method": rpc_method, "params": params, "id": id})
}

/// Answer `rpc_method` with `body`
pub async fn mount_rpc(server: &MockServer, rpc_method: &str, body: Value) {
    Mock::given(method("POST"))
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
