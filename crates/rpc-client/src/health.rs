// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Health types for upstream providers

use std::time::Duration;

const DEFAULT_PROBE_TIMEOUT_SECONDS: u64 = 5;
const DEFAULT_PROBE_INTERVAL_SECONDS: u64 = 30;
/// Blocks a provider may trail the highest observed height before it is reported as lagging
pub const DEFAULT_MAX_BLOCK_LAG: u64 = 2;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health status of a provider or of the whole pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[allow(missing_docs)]
pub enum HealthStatus {
    /// Serving requests
    Up,
    /// Serving requests with reduced capacity
    Degraded { reason: String },
    /// Not serving requests
    Down { reason: String },
}

impl HealthStatus {
    /// Check if this health status indicates the service is available
    pub fn is_available(&self) -> bool {
        matches!(self, HealthStatus::Up | HealthStatus::Degraded { .. })
    }

    /// Check if this health status indicates the service is completely down
    pub fn is_down(&self) -> bool {
        matches!(self, HealthStatus::Down { .. })
    }

    /// Get a human-readable description of the status
    pub fn description(&self) -> &str {
        match self {
            HealthStatus::Up => "All providers are available",
            HealthStatus::Degraded { reason } | HealthStatus::Down { reason } => reason,
        }
    }

    /// Derive the pool status from how many providers are under their error budget
    pub fn from_availability(available: usize, total: usize) -> Self {
        if total > 0 && available == total {
            HealthStatus::Up
        } else if available > 0 {
            HealthStatus::Degraded {
                reason: format!("{available} of {total} providers available"),
            }
        } else {
            HealthStatus::Down {
                reason: "no provider is under its error budget".to_string(),
            }
        }
    }
}

/// Block-height probe configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheckConfig {
    /// Timeout for a single probe
    pub timeout: Duration,
    /// Interval between probe rounds
    pub interval: Duration,
    /// Height spread above which lagging providers are reported
    pub max_block_lag: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECONDS),
            interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECONDS),
            max_block_lag: DEFAULT_MAX_BLOCK_LAG,
        }
    }
}

/// Outcome of one successful block-height probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Chain height reported by the provider
    pub block_height: u64,
    /// Round-trip time of the probe
    pub response_time: Duration,
    /// When the probe completed
    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    /// Record a probe that just completed
    pub fn new(block_height: u64, response_time: Duration) -> Self {
        Self {
            block_height,
            response_time,
            timestamp: Utc::now(),
        }
    }
}

/// Chain-tip freshness of a provider relative to the rest of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Within one block of the highest observed height
    Synced,
    /// Further behind than one block
    Lagging,
    /// No successful probe yet
    Unknown,
}

impl SyncStatus {
    /// Classify a provider height against the highest height in the pool
    pub fn classify(height: Option<u64>, max_height: Option<u64>) -> Self {
        match (height, max_height) {
            (Some(height), Some(max)) if max.saturating_sub(height) <= 1 => SyncStatus::Synced,
            (Some(_), Some(_)) => SyncStatus::Lagging,
            _ => SyncStatus::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_availability() {
        assert!(HealthStatus::Up.is_available());
        assert!(
            HealthStatus::Degraded {
                reason: "slow".to_string()
            }
            .is_available()
        );
        assert!(
            !HealthStatus::Down {
                reason: "offline".to_string()
            }
            .is_available()
        );
        assert!(
            HealthStatus::Down {
                reason: "offline".to_string()
            }
            .is_down()
        );
    }

    #[test]
    fn pool_status_from_availability() {
        assert_eq!(HealthStatus::from_availability(6, 6), HealthStatus::Up);
        let degraded = HealthStatus::from_availability(2, 6);
        assert!(degraded.is_available());
        assert_eq!(degraded.description(), "2 of 6 providers available");
        assert!(HealthStatus::from_availability(0, 6).is_down());
        assert!(HealthStatus::from_availability(0, 0).is_down());
    }

    #[test]
    fn health_check_config_defaults() {
        let config = HealthCheckConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.max_block_lag, 2);
    }

    #[test]
    fn sync_classification() {
        assert_eq!(SyncStatus::classify(Some(100), Some(100)), SyncStatus::Synced);
        assert_eq!(SyncStatus::classify(Some(99), Some(100)), SyncStatus::Synced);
        assert_eq!(SyncStatus::classify(Some(98), Some(100)), SyncStatus::Lagging);
        assert_eq!(SyncStatus::classify(None, Some(100)), SyncStatus::Unknown);
        assert_eq!(SyncStatus::classify(Some(5), None), SyncStatus::Unknown);
    }
}
