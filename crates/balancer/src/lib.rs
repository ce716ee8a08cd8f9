// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Load-balancing engine for JSON-RPC node providers
//!
//! Each inbound request is answered from a short-lived cache or forwarded to
//! one provider per attempt, chosen by stickiness, chain-sync freshness,
//! error budget, priority and rate limit. Failed attempts are retried with
//! exponential backoff.
//!
//! # Architecture
//!
//! - **Engine**: [`dispatcher::Balancer`] - cache lookup, attempt loop, statistics
//! - **Selection**: [`selector`], [`rate_limit`], [`session::SessionStore`]
//! - **State**: [`registry::ProviderRegistry`] - fixed arena of providers with atomic state
//! - **Background work**: [`health::HealthTracker`] and the cache/session sweeper
//! - **Transport**: [`http::HttpTransport`] - `reqwest` implementation of `UpstreamTransport`
//! - **Validation Utilities**: [`non_empty_string::NonEmptyString`] - provider names

pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod health;
pub mod http;
pub mod non_empty_string;
pub mod rate_limit;
pub mod registry;
pub mod selector;
pub mod session;
pub mod snapshot;
pub mod stats;

pub use cache::{CacheStats, ResponseCache};
pub use config::{BalancerConfig, ConfigError, ProviderConfig};
pub use dispatcher::{Balancer, BalancerError, DispatchError, DispatchOutcome, Dispatched};
pub use health::{HealthTracker, ProbeError, ProbeRound};
pub use http::HttpTransport;
pub use non_empty_string::NonEmptyString;
pub use registry::{Provider, ProviderRegistry};
pub use session::{ClientSession, SessionStore};
pub use snapshot::{BalancerSnapshot, ProviderHealth};
pub use stats::{ProviderStats, RequestStats, StatsSnapshot};
