// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Balancer configuration
//!
//! Loaded once at startup (nested under `balancer` in the server configuration)
//! and validated before the registry is built. Every duration is expressed in
//! milliseconds on the wire.

use std::{collections::HashSet, num::NonZeroU32, time::Duration};

use rpc_client::HealthCheckConfig;
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use thiserror::Error;
use url::Url;

use crate::NonEmptyString;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10);
const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(300);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);
const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(5);
const DEFAULT_COOLDOWN_MIN: Duration = Duration::from_millis(2000);
const DEFAULT_COOLDOWN_MAX: Duration = Duration::from_millis(3000);

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum ConfigError {
    /// The provider list is empty
    #[error("at least one provider must be configured")]
    NoProviders,

    /// Two providers share a name
    #[error("duplicate provider name '{name}'")]
    DuplicateProvider { name: String },

    /// A provider URL is not HTTP(S)
    #[error("provider '{name}' has unsupported URL scheme '{scheme}'")]
    UnsupportedScheme { name: String, scheme: String },

    /// A setting is outside its valid range
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// One upstream endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique display name, used in logs and statistics
    pub name: NonEmptyString,
    /// JSON-RPC endpoint
    pub url: Url,
    /// Allowed requests per second
    pub rate_limit: NonZeroU32,
    /// Error budget before the provider is skipped
    pub max_errors: NonZeroU32,
    /// Lower is preferred; ties keep configuration order
    #[serde(default)]
    pub priority: u32,
}

impl ProviderConfig {
    /// Create a provider entry
    pub fn new(
        name: NonEmptyString,
        url: Url,
        rate_limit: NonZeroU32,
        max_errors: NonZeroU32,
        priority: u32,
    ) -> Self {
        Self {
            name,
            url,
            rate_limit,
            max_errors,
            priority,
        }
    }
}

/// Engine settings
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Upstream providers in configuration order
    pub providers: Vec<ProviderConfig>,
    /// Attempts per inbound request
    pub max_retries: u32,
    /// Deadline for a forwarded call
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "request_timeout_ms")]
    pub request_timeout: Duration,
    /// Deadline for a block-height probe
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "probe_timeout_ms")]
    pub probe_timeout: Duration,
    /// Time between probe rounds
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "health_check_interval_ms")]
    pub health_check_interval: Duration,
    /// Lifetime of a cached response
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "cache_ttl_ms")]
    pub cache_ttl: Duration,
    /// Idle time after which a client session expires
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "session_ttl_ms")]
    pub session_ttl: Duration,
    /// Time between cache and session sweeps
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "sweep_interval_ms")]
    pub sweep_interval: Duration,
    /// Backoff after the first failed attempt, doubled per attempt
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "backoff_base_ms")]
    pub backoff_base: Duration,
    /// Backoff ceiling
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "backoff_max_ms")]
    pub backoff_max: Duration,
    /// Lower bound of the extra wait after a rate-limited attempt
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "rate_limit_cooldown_min_ms")]
    pub rate_limit_cooldown_min: Duration,
    /// Upper bound of the extra wait after a rate-limited attempt
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "rate_limit_cooldown_max_ms")]
    pub rate_limit_cooldown_max: Duration,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            cache_ttl: DEFAULT_CACHE_TTL,
            session_ttl: DEFAULT_SESSION_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
            rate_limit_cooldown_min: DEFAULT_COOLDOWN_MIN,
            rate_limit_cooldown_max: DEFAULT_COOLDOWN_MAX,
        }
    }
}

impl BalancerConfig {
    /// Default settings with the given providers
    pub fn with_providers(providers: Vec<ProviderConfig>) -> Self {
        Self {
            providers,
            ..Self::default()
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.name.as_str()) {
                return Err(ConfigError::DuplicateProvider {
                    name: provider.name.to_string(),
                });
            }
            let scheme = provider.url.scheme();
            if scheme != "http" && scheme != "https" {
                return Err(ConfigError::UnsupportedScheme {
                    name: provider.name.to_string(),
                    scheme: scheme.to_string(),
                });
            }
        }

        if self.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_retries",
                reason: "must be at least 1".to_string(),
            });
        }

        for (field, value) in [
            ("request_timeout_ms", self.request_timeout),
            ("probe_timeout_ms", self.probe_timeout),
            ("health_check_interval_ms", self.health_check_interval),
            ("sweep_interval_ms", self.sweep_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if self.backoff_base > self.backoff_max {
            return Err(ConfigError::InvalidValue {
                field: "backoff_base_ms",
                reason: "must not exceed backoff_max_ms".to_string(),
            });
        }

        if self.rate_limit_cooldown_min > self.rate_limit_cooldown_max {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit_cooldown_min_ms",
                reason: "must not exceed rate_limit_cooldown_max_ms".to_string(),
            });
        }

        Ok(())
    }

    /// Probe settings derived from this configuration
    pub fn health_check(&self) -> HealthCheckConfig {
        HealthCheckConfig {
            timeout: self.probe_timeout,
            interval: self.health_check_interval,
            ..HealthCheckConfig::default()
        }
    }
}
