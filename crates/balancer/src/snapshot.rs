// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Diagnostics snapshots

use chrono::{DateTime, Utc};
use rpc_client::{HealthStatus, SyncStatus};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{registry::Provider, stats::StatsSnapshot};

/// Point-in-time view of one provider
///
/// The endpoint URL is left out since hosted providers embed API keys in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProviderHealth {
    /// Provider name
    pub name: String,
    /// Under its error budget
    pub available: bool,
    /// Current error count
    pub error_count: u32,
    /// Error budget
    pub max_errors: u32,
    /// Allowed requests per second
    pub rate_limit: u32,
    /// Selection priority, lower is preferred
    pub priority: u32,
    /// Last observed chain height
    pub block_height: Option<u64>,
    /// When the last successful probe completed
    pub last_health_check: Option<DateTime<Utc>>,
    /// Freshness relative to the highest observed height
    pub sync_status: SyncStatus,
}

impl ProviderHealth {
    /// Capture a provider's state against the pool's highest height
    pub fn from_provider(provider: &Provider, max_height: Option<u64>) -> Self {
        let block_height = provider.block_height();
        Self {
            name: provider.name().to_string(),
            available: provider.is_available(),
            error_count: provider.error_count(),
            max_errors: provider.max_errors(),
            rate_limit: provider.rate_limit(),
            priority: provider.priority(),
            block_height,
            last_health_check: provider.last_health_check(),
            sync_status: SyncStatus::classify(block_height, max_height),
        }
    }
}

/// Engine-wide diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BalancerSnapshot {
    /// Pool status derived from provider availability
    pub status: HealthStatus,
    /// Providers in configuration order
    pub providers: Vec<ProviderHealth>,
    /// Request counters
    pub stats: StatsSnapshot,
    /// Stored cache entries
    pub cache_entries: usize,
    /// Stored client sessions
    pub sessions: usize,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
}

impl BalancerSnapshot {
    /// Assemble a snapshot, deriving the pool status
    pub fn new(
        providers: Vec<ProviderHealth>,
        stats: StatsSnapshot,
        cache_entries: usize,
        sessions: usize,
    ) -> Self {
        let available = providers.iter().filter(|p| p.available).count();
        Self {
            status: HealthStatus::from_availability(available, providers.len()),
            providers,
            stats,
            cache_entries,
            sessions,
            timestamp: Utc::now(),
        }
    }
}
