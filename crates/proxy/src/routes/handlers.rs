// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP request handlers module
//!
//! The JSON-RPC entry point plus the diagnostics endpoints.

use std::time::Instant;

use axum::{Json, extract::State, http::StatusCode};
use serde_json::Value;
use shared_types::{JsonRpcErrorResponse, JsonRpcRequest};

use crate::{
    error::ServerError,
    extractors::{ClientAddr, JsonRpc},
    metrics,
    state::{HealthCheck, ServerState, StatsReport},
};

/// Forward one JSON-RPC request through the balancer
///
/// Successful responses and upstream application errors are returned as the
/// provider sent them. Cached responses carry the caller's `id`.
///
/// # Errors
///
/// Returns `ServerError::Dispatch` when every attempt failed.
#[utoipa::path(
    post,
    path = "/",
    tag = "rpc",
    summary = "JSON-RPC endpoint",
    description = "Forwards a single JSON-RPC 2.0 request to the best available upstream provider, with caching, sticky sessions, retries and failover.",
    request_body = JsonRpcRequest,
    responses(
        (status = 200, description = "Upstream response, success or application error", content_type = "application/json"),
        (status = 400, description = "Malformed JSON or invalid request", body = JsonRpcErrorResponse),
        (status = 500, description = "Every attempt failed", body = JsonRpcErrorResponse)
    )
)]
pub async fn rpc_handler(
    State(state): State<ServerState>,
    client: ClientAddr,
    JsonRpc(request): JsonRpc,
) -> Result<Json<Value>, ServerError> {
    let started = Instant::now();
    let result = state.balancer().handle(&request, client.as_deref()).await;
    let elapsed = started.elapsed().as_secs_f64();

    match result {
        Ok(dispatched) => {
            metrics::record_request(&request.method, dispatched.outcome.as_str(), elapsed);
            Ok(Json(dispatched.response))
        }
        Err(source) => {
            metrics::record_request(&request.method, "failed", elapsed);
            Err(ServerError::Dispatch {
                id: request.id,
                source,
            })
        }
    }
}

/// Health check endpoint handler
#[utoipa::path(
    get,
    path = "/health",
    tag = "diagnostics",
    summary = "Provider pool health",
    description = "Returns the pool status (Up, Degraded or Down), per-provider error counts, block heights and sync status, request counters, and the service version. Provider URLs are never included.",
    responses(
        (status = 200, description = "At least one provider is under its error budget", body = HealthCheck),
        (status = 503, description = "Every provider is over its error budget", body = HealthCheck)
    )
)]
pub async fn health_handler(State(state): State<ServerState>) -> (StatusCode, Json<HealthCheck>) {
    let health = state.health_check();
    let status = if health.snapshot.status.is_down() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(health))
}

/// Statistics endpoint handler
#[utoipa::path(
    get,
    path = "/stats",
    tag = "diagnostics",
    summary = "Request statistics",
    description = "Returns request counters, per-provider attempt counters, cache statistics and process uptime.",
    responses(
        (status = 200, description = "Current statistics", body = StatsReport)
    )
)]
pub async fn stats_handler(State(state): State<ServerState>) -> Json<StatsReport> {
    Json(state.stats_report())
}
