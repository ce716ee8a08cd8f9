// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server state management module
//!
//! Shared handler state: configuration, the balancer engine and the
//! cancellation token for coordinated shutdown.

use std::{sync::Arc, time::Instant};

use balancer::{Balancer, BalancerSnapshot, CacheStats};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::config::{Environment, ServerConfig};

/// Shared application state with cancellation token support
#[derive(Debug, Clone)]
pub struct ServerState {
    /// Server configuration
    config: Arc<ServerConfig>,
    /// Load-balancing engine
    balancer: Arc<Balancer>,
    /// Process start, for uptime reporting
    started_at: Instant,
    /// Cancellation token for coordinated shutdown
    pub cancellation_token: CancellationToken,
}

impl ServerState {
    /// Create new server state
    pub fn new(
        config: ServerConfig,
        balancer: Arc<Balancer>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            config: Arc::new(config),
            balancer,
            started_at: Instant::now(),
            cancellation_token,
        }
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The engine serving requests
    pub fn balancer(&self) -> &Arc<Balancer> {
        &self.balancer
    }

    /// Seconds since the state was created
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Pool health with service metadata
    pub fn health_check(&self) -> HealthCheck {
        HealthCheck {
            version: Box::from(env!("CARGO_PKG_VERSION")),
            environment: self.config.environment,
            snapshot: self.balancer.snapshot(),
        }
    }

    /// Request statistics with uptime and cache counters
    pub fn stats_report(&self) -> StatsReport {
        StatsReport {
            uptime_seconds: self.uptime_seconds(),
            cache: self.balancer.cache().stats(),
            snapshot: self.balancer.snapshot(),
        }
    }
}

/// Response of `GET /health`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthCheck {
    /// Service version
    pub version: Box<str>,
    /// Environment
    pub environment: Environment,
    /// Pool status, providers, counters and timestamp
    #[serde(flatten)]
    pub snapshot: BalancerSnapshot,
}

/// Response of `GET /stats`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsReport {
    /// Seconds since the server started
    pub uptime_seconds: u64,
    /// Response cache counters
    pub cache: CacheStats,
    /// Pool status, providers, counters and timestamp
    #[serde(flatten)]
    pub snapshot: BalancerSnapshot,
}
