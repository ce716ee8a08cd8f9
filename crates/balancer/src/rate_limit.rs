// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Per-provider minimum-interval gate
//!
//! Advisory under concurrency: two tasks may read the same stamp and both
//! proceed. Sequential calls to one provider are always spaced by at least
//! `1s / rate_limit`.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::trace;

use crate::registry::Provider;

/// Wait until `provider` may be called again, then stamp the request time
///
/// Returns how long the caller was held back.
pub async fn acquire(provider: &Provider) -> Duration {
    let wait = provider.remaining_wait(Instant::now());
    if !wait.is_zero() {
        trace!(
            provider = %provider.name(),
            wait_ms = wait.as_millis(),
            "rate limit wait"
        );
        sleep(wait).await;
    }
    provider.stamp_request(Instant::now());
    wait
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ProviderRegistry, tests::sample_pool};

    #[tokio::test(start_paused = true)]
    async fn first_call_is_not_delayed() {
        let registry = ProviderRegistry::new(sample_pool()).unwrap();
        let provider = registry.get(0).unwrap();
        assert_eq!(acquire(provider).await, Duration::ZERO);
        assert!(provider.last_request().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_calls_respect_min_interval() {
        let registry = ProviderRegistry::new(sample_pool()).unwrap();
        let provider = registry.get(2).unwrap();

        let mut stamps = Vec::new();
        for _ in 0..5 {
            acquire(provider).await;
            stamps.push(provider.last_request().unwrap());
        }

        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= provider.min_interval());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waits_only_the_remainder() {
        let registry = ProviderRegistry::new(sample_pool()).unwrap();
        let provider = registry.get(2).unwrap();

        acquire(provider).await;
        tokio::time::advance(Duration::from_millis(30)).await;

        let start = Instant::now();
        assert_eq!(acquire(provider).await, Duration::from_millis(20));
        assert_eq!(Instant::now() - start, Duration::from_millis(20));
    }
}
