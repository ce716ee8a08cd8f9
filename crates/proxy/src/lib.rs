// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! RPC Balancer HTTP server
//!
//! Exposes the load-balancing engine as a JSON-RPC endpoint built with Axum,
//! with hierarchical configuration, diagnostics endpoints, Prometheus metrics
//! and graceful shutdown.
//!
//! # Module Structure
//!
//! - [`config`]: Server configuration and environment management with hierarchical loading
//! - [`error`]: Error types rendered as JSON-RPC error envelopes
//! - [`extractors`]: JSON-RPC body and client address extractors
//! - [`state`]: Shared application state with cancellation token support
//! - [`server`]: Main server implementation, lifecycle, and coordinated shutdown
//! - [`routes`]: Route configuration and HTTP request handlers
//! - [`metrics`]: Prometheus metrics and the scrape handler
//! - [`openapi`]: `OpenAPI` specification and Swagger UI endpoints for API documentation
//!
//! # Endpoints
//!
//! - `POST /`: forward one JSON-RPC request
//! - `GET /health`: pool status and per-provider diagnostics
//! - `GET /stats`: request counters, cache statistics and uptime
//! - `GET /metrics`: Prometheus text exposition
//! - `GET /api-doc/openapi.json`: `OpenAPI` document

pub mod config;
pub mod error;
pub mod extractors;
pub mod metrics;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{Environment, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use server::{Server, ShutdownConfig};
pub use state::{HealthCheck, ServerState, StatsReport};
