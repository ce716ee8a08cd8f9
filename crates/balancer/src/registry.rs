// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Provider registry
//!
//! The provider set is fixed at startup and stored as an arena indexed by
//! configuration position. Mutable per-provider state lives in atomics so the
//! dispatcher, selector and health tracker never hold a lock across an await.
//! Each field has a single writer role:
//!
//! - `last_request` is stamped by the rate limiter just before a call
//! - `error_count` moves on attempt outcomes and on the degraded-fallback reset
//! - `block_height` and `last_health_check` are written only by the health tracker

use std::{
    sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering},
    time::Duration,
};

use chrono::{DateTime, Utc};
use rpc_client::ProbeResult;
use tokio::time::Instant;
use url::Url;

use crate::{
    NonEmptyString,
    config::{ConfigError, ProviderConfig},
};

const NEVER: u64 = 0;
const UNKNOWN_HEIGHT: u64 = u64::MAX;
const NEVER_CHECKED: i64 = 0;

/// One upstream endpoint and its live state
#[derive(Debug)]
pub struct Provider {
    config: ProviderConfig,
    min_interval: Duration,
    epoch: Instant,
    error_count: AtomicU32,
    /// Microseconds since `epoch` plus one; `NEVER` until the first call
    last_request: AtomicU64,
    block_height: AtomicU64,
    /// Unix milliseconds of the last successful probe
    last_health_check: AtomicI64,
}

impl Provider {
    fn new(config: ProviderConfig, epoch: Instant) -> Self {
        let min_interval = Duration::from_secs(1) / config.rate_limit.get();
        Self {
            config,
            min_interval,
            epoch,
            error_count: AtomicU32::new(0),
            last_request: AtomicU64::new(NEVER),
            block_height: AtomicU64::new(UNKNOWN_HEIGHT),
            last_health_check: AtomicI64::new(NEVER_CHECKED),
        }
    }

    /// Display name
    pub fn name(&self) -> &NonEmptyString {
        &self.config.name
    }

    /// JSON-RPC endpoint
    pub fn url(&self) -> &Url {
        &self.config.url
    }

    /// Allowed requests per second
    pub fn rate_limit(&self) -> u32 {
        self.config.rate_limit.get()
    }

    /// Error budget
    pub fn max_errors(&self) -> u32 {
        self.config.max_errors.get()
    }

    /// Selection priority, lower is preferred
    pub fn priority(&self) -> u32 {
        self.config.priority
    }

    /// Minimum spacing between consecutive calls
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Current error count
    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Whether the provider is under its error budget
    pub fn is_available(&self) -> bool {
        self.error_count() < self.max_errors()
    }

    /// Decrement the error count, never below zero
    pub fn record_success(&self) {
        let _ = self
            .error_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                count.checked_sub(1)
            });
    }

    /// Increment the error count
    pub fn record_failure(&self) {
        let _ = self
            .error_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                Some(count.saturating_add(1))
            });
    }

    /// Halve the error count, rounding down
    pub fn halve_errors(&self) {
        let _ = self
            .error_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                Some(count / 2)
            });
    }

    /// When the last call was stamped, if ever
    pub fn last_request(&self) -> Option<Instant> {
        match self.last_request.load(Ordering::Relaxed) {
            NEVER => None,
            stamp => Some(self.epoch + Duration::from_micros(stamp - 1)),
        }
    }

    /// Record that a call is about to be made
    pub fn stamp_request(&self, now: Instant) {
        let micros = now.saturating_duration_since(self.epoch).as_micros();
        let stamp = u64::try_from(micros).unwrap_or(u64::MAX - 1) + 1;
        self.last_request.store(stamp, Ordering::Relaxed);
    }

    /// Time left before the next call respects the minimum interval
    pub fn remaining_wait(&self, now: Instant) -> Duration {
        self.last_request().map_or(Duration::ZERO, |last| {
            self.min_interval
                .saturating_sub(now.saturating_duration_since(last))
        })
    }

    /// Whether a call made at `now` would respect the minimum interval
    pub fn is_ready(&self, now: Instant) -> bool {
        self.remaining_wait(now).is_zero()
    }

    /// Last observed chain height, if any probe succeeded
    pub fn block_height(&self) -> Option<u64> {
        match self.block_height.load(Ordering::Relaxed) {
            UNKNOWN_HEIGHT => None,
            height => Some(height),
        }
    }

    /// When the last successful probe completed
    pub fn last_health_check(&self) -> Option<DateTime<Utc>> {
        match self.last_health_check.load(Ordering::Relaxed) {
            NEVER_CHECKED => None,
            millis => DateTime::from_timestamp_millis(millis),
        }
    }

    /// Store the outcome of a successful probe
    pub fn record_probe(&self, probe: &ProbeResult) {
        self.block_height
            .store(probe.block_height.min(UNKNOWN_HEIGHT - 1), Ordering::Relaxed);
        self.last_health_check
            .store(probe.timestamp.timestamp_millis(), Ordering::Relaxed);
    }
}

/// Fixed set of providers indexed by configuration position
#[derive(Debug)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
    by_priority: Vec<usize>,
}

impl ProviderRegistry {
    /// Build the registry from configuration order
    pub fn new(configs: impl IntoIterator<Item = ProviderConfig>) -> Result<Self, ConfigError> {
        let epoch = Instant::now();
        let providers: Vec<Provider> = configs
            .into_iter()
            .map(|config| Provider::new(config, epoch))
            .collect();
        if providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        let mut by_priority: Vec<usize> = (0..providers.len()).collect();
        // stable, so configuration order breaks ties
        by_priority.sort_by_key(|&index| providers[index].priority());

        Ok(Self {
            providers,
            by_priority,
        })
    }

    /// Number of providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Always false for a constructed registry
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider at `index`
    pub fn get(&self, index: usize) -> Option<&Provider> {
        self.providers.get(index)
    }

    /// Providers in configuration order
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Index and provider pairs in configuration order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Provider)> {
        self.providers.iter().enumerate()
    }

    /// Indices ordered by ascending priority, configuration order within a tier
    pub fn by_priority(&self) -> &[usize] {
        &self.by_priority
    }

    /// Highest-priority provider under its error budget
    pub fn best_available(&self) -> Option<usize> {
        self.by_priority
            .iter()
            .copied()
            .find(|&index| self.providers[index].is_available())
    }

    /// Number of providers under their error budget
    pub fn available_count(&self) -> usize {
        self.providers.iter().filter(|p| p.is_available()).count()
    }

    /// Halve every provider's error count
    pub fn halve_all_errors(&self) {
        for provider in &self.providers {
            provider.halve_errors();
        }
    }

    /// Highest chain height reported by any provider
    pub fn max_block_height(&self) -> Option<u64> {
        self.providers.iter().filter_map(Provider::block_height).max()
    }

    /// Lowest chain height reported by any provider
    pub fn min_block_height(&self) -> Option<u64> {
        self.providers.iter().filter_map(Provider::block_height).min()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::num::NonZeroU32;

    use super::*;

    pub(crate) fn provider_config(
        name: &str,
        rate_limit: u32,
        max_errors: u32,
        priority: u32,
    ) -> ProviderConfig {
        ProviderConfig::new(
            NonEmptyString::new(name).unwrap(),
            Url::parse(&format!("https://{}.example/rpc", name.to_lowercase())).unwrap(),
            NonZeroU32::new(rate_limit).unwrap(),
            NonZeroU32::new(max_errors).unwrap(),
            priority,
        )
    }

    /// The six-provider layout used across the engine tests
    pub(crate) fn sample_pool() -> Vec<ProviderConfig> {
        vec![
            provider_config("QuickNode", 15, 5, 1),
            provider_config("Alchemy", 15, 5, 1),
            provider_config("Ankr", 20, 3, 3),
            provider_config("DRPC", 15, 3, 5),
            provider_config("Public_Panda", 15, 3, 5),
            provider_config("Public_Thirdweb", 15, 3, 5),
        ]
    }

    #[test]
    fn rejects_empty_pool() {
        assert_eq!(
            ProviderRegistry::new(Vec::new()).unwrap_err(),
            ConfigError::NoProviders
        );
    }

    #[test]
    fn priority_order_is_stable() {
        let registry = ProviderRegistry::new(vec![
            provider_config("c", 10, 3, 5),
            provider_config("a", 10, 3, 1),
            provider_config("d", 10, 3, 5),
            provider_config("b", 10, 3, 1),
        ])
        .unwrap();
        assert_eq!(registry.by_priority(), &[1, 3, 0, 2]);
        assert_eq!(registry.best_available(), Some(1));
    }

    #[test]
    fn error_count_moves_by_one_and_halves() {
        let registry = ProviderRegistry::new(sample_pool()).unwrap();
        let provider = registry.get(0).unwrap();

        provider.record_success();
        assert_eq!(provider.error_count(), 0);

        for _ in 0..5 {
            provider.record_failure();
        }
        assert_eq!(provider.error_count(), 5);
        assert!(!provider.is_available());

        provider.record_success();
        assert_eq!(provider.error_count(), 4);
        assert!(provider.is_available());

        provider.record_failure();
        provider.halve_errors();
        assert_eq!(provider.error_count(), 2);
        provider.halve_errors();
        provider.halve_errors();
        assert_eq!(provider.error_count(), 0);
    }

    #[test]
    fn min_interval_from_rate_limit() {
        let registry = ProviderRegistry::new(sample_pool()).unwrap();
        assert_eq!(registry.get(2).unwrap().min_interval(), Duration::from_millis(50));
        assert_eq!(
            registry.get(0).unwrap().min_interval(),
            Duration::from_nanos(66_666_666)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_wait_tracks_last_request() {
        let registry = ProviderRegistry::new(sample_pool()).unwrap();
        let provider = registry.get(2).unwrap();
        let now = Instant::now();

        assert_eq!(provider.last_request(), None);
        assert!(provider.is_ready(now));

        provider.stamp_request(now);
        assert_eq!(provider.last_request(), Some(now));
        assert_eq!(provider.remaining_wait(now), Duration::from_millis(50));

        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(
            provider.remaining_wait(Instant::now()),
            Duration::from_millis(30)
        );

        tokio::time::advance(Duration::from_millis(30)).await;
        assert!(provider.is_ready(Instant::now()));
    }

    #[test]
    fn probe_results_update_health_fields() {
        let registry = ProviderRegistry::new(sample_pool()).unwrap();
        assert_eq!(registry.max_block_height(), None);

        let probe = ProbeResult::new(19_000_000, Duration::from_millis(40));
        registry.get(1).unwrap().record_probe(&probe);
        registry
            .get(3)
            .unwrap()
            .record_probe(&ProbeResult::new(18_999_990, Duration::from_millis(40)));

        let provider = registry.get(1).unwrap();
        assert_eq!(provider.block_height(), Some(19_000_000));
        assert_eq!(
            provider.last_health_check().unwrap().timestamp_millis(),
            probe.timestamp.timestamp_millis()
        );
        assert_eq!(registry.max_block_height(), Some(19_000_000));
        assert_eq!(registry.min_block_height(), Some(18_999_990));
        assert_eq!(registry.get(0).unwrap().last_health_check(), None);
    }

    #[test]
    fn halve_all_errors_applies_to_every_provider() {
        let registry = ProviderRegistry::new(sample_pool()).unwrap();
        for (_, provider) in registry.iter() {
            for _ in 0..provider.max_errors() {
                provider.record_failure();
            }
        }
        assert_eq!(registry.available_count(), 0);
        assert_eq!(registry.best_available(), None);

        registry.halve_all_errors();
        let counts: Vec<u32> = registry.providers().iter().map(Provider::error_count).collect();
        assert_eq!(counts, vec![2, 2, 1, 1, 1, 1]);
        assert_eq!(registry.available_count(), 6);
    }
}
