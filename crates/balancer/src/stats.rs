// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Process-wide request statistics
//!
//! Counters only ever increase. Per-provider counters are indexed like the
//! registry so updates never touch a map.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::registry::ProviderRegistry;

#[derive(Debug, Default)]
struct ProviderCounters {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl ProviderCounters {
    fn load(&self) -> (u64, u64, u64) {
        (
            self.requests.load(Ordering::Relaxed),
            self.successes.load(Ordering::Relaxed),
            self.failures.load(Ordering::Relaxed),
        )
    }
}

/// Request counters
#[derive(Debug)]
pub struct RequestStats {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    cache_hits: AtomicU64,
    providers: Vec<ProviderCounters>,
}

impl RequestStats {
    /// Create zeroed counters for `providers` registry slots
    pub fn new(providers: usize) -> Self {
        Self {
            total: AtomicU64::new(0),
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            providers: (0..providers).map(|_| ProviderCounters::default()).collect(),
        }
    }

    /// Count an inbound request
    pub fn record_request(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a request answered from the cache
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an attempt that produced an answer
    pub fn record_success(&self, provider: usize) {
        self.successful.fetch_add(1, Ordering::Relaxed);
        if let Some(counters) = self.providers.get(provider) {
            counters.requests.fetch_add(1, Ordering::Relaxed);
            counters.successes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count a failed attempt
    pub fn record_attempt_failure(&self, provider: usize) {
        if let Some(counters) = self.providers.get(provider) {
            counters.requests.fetch_add(1, Ordering::Relaxed);
            counters.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count a request that exhausted its attempts
    pub fn record_exhausted(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Inbound requests, cache hits included
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Requests that ended with an upstream answer
    pub fn successful(&self) -> u64 {
        self.successful.load(Ordering::Relaxed)
    }

    /// Requests that exhausted their attempts
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Requests answered from the cache
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter, labelled with provider names
    pub fn snapshot(&self, registry: &ProviderRegistry) -> StatsSnapshot {
        let by_provider = registry
            .iter()
            .map(|(index, provider)| {
                let (requests, successes, failures) = self
                    .providers
                    .get(index)
                    .map_or((0, 0, 0), ProviderCounters::load);
                ProviderStats {
                    name: provider.name().to_string(),
                    requests,
                    successes,
                    failures,
                }
            })
            .collect();

        StatsSnapshot {
            total: self.total(),
            successful: self.successful(),
            failed: self.failed(),
            cache_hits: self.cache_hits(),
            by_provider,
        }
    }
}

/// Per-provider attempt counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProviderStats {
    /// Provider name
    pub name: String,
    /// Attempts sent to the provider
    pub requests: u64,
    /// Attempts that produced an answer
    pub successes: u64,
    /// Attempts that failed
    pub failures: u64,
}

/// Global request counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatsSnapshot {
    /// Inbound requests, cache hits included
    pub total: u64,
    /// Requests answered by a provider
    pub successful: u64,
    /// Requests that exhausted every attempt
    pub failed: u64,
    /// Requests answered from the cache
    pub cache_hits: u64,
    /// Attempt counters in configuration order
    pub by_provider: Vec<ProviderStats>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::sample_pool;

    #[test]
    fn counters_accumulate() {
        let registry = ProviderRegistry::new(sample_pool()).unwrap();
        let stats = RequestStats::new(registry.len());

        stats.record_request();
        stats.record_attempt_failure(2);
        stats.record_success(3);

        stats.record_request();
        stats.record_cache_hit();

        stats.record_request();
        for _ in 0..3 {
            stats.record_attempt_failure(0);
        }
        stats.record_exhausted();

        let snapshot = stats.snapshot(&registry);
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.successful, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.by_provider.len(), 6);
        assert_eq!(
            snapshot.by_provider[0],
            ProviderStats {
                name: "QuickNode".to_string(),
                requests: 3,
                successes: 0,
                failures: 3,
            }
        );
        assert_eq!(snapshot.by_provider[2].failures, 1);
        assert_eq!(snapshot.by_provider[3].successes, 1);
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let stats = RequestStats::new(1);
        stats.record_success(7);
        stats.record_attempt_failure(7);
        assert_eq!(stats.successful(), 1);
    }
}
