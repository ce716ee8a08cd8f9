// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Provider selection for a single attempt
//!
//! Order of preference:
//!
//! 1. the provider of the client's live session, if it is under budget (and in
//!    sync when required); unknown clients get no session here
//! 2. providers under budget by ascending priority, optionally restricted to
//!    those within one block of the highest known height
//! 3. among those, the first whose minimum interval has elapsed, otherwise the
//!    one with the shortest remaining wait
//!
//! When every provider is over budget all error counts are halved and the first
//! configured provider is returned. That reset is the only side effect here;
//! the request timestamp is stamped by the rate limiter.

use tokio::time::Instant;
use tracing::{trace, warn};

use crate::{registry::ProviderRegistry, session::SessionStore};

/// Index returned when every provider is over budget
pub const FALLBACK_PROVIDER: usize = 0;

/// Pick a provider for the next attempt
pub fn select_provider(
    registry: &ProviderRegistry,
    sessions: &SessionStore,
    client_id: Option<&str>,
    prefer_sync: bool,
) -> usize {
    let now = Instant::now();
    let providers = registry.providers();

    let mut candidates: Vec<usize> = registry
        .by_priority()
        .iter()
        .copied()
        .filter(|&index| providers[index].is_available())
        .collect();
    let max_height = candidates
        .iter()
        .filter_map(|&index| providers[index].block_height())
        .max();
    let in_sync = |index: usize| {
        match (providers[index].block_height(), max_height) {
            (Some(height), Some(max)) => max.saturating_sub(height) <= 1,
            _ => true,
        }
    };

    if let Some(client_id) = client_id
        && let Some(index) = sessions.touch(client_id)
        && providers[index].is_available()
        && (!prefer_sync || in_sync(index))
    {
        trace!(client_id, provider = %providers[index].name(), "sticky provider");
        return index;
    }

    if prefer_sync && candidates.len() > 1 {
        candidates.retain(|&index| in_sync(index));
    }

    if candidates.is_empty() {
        warn!(
            providers = providers.len(),
            "every provider is over its error budget, halving error counts"
        );
        registry.halve_all_errors();
        return FALLBACK_PROVIDER;
    }

    candidates
        .iter()
        .copied()
        .find(|&index| providers[index].is_ready(now))
        .or_else(|| {
            candidates
                .iter()
                .copied()
                .min_by_key(|&index| providers[index].remaining_wait(now))
        })
        .unwrap_or(FALLBACK_PROVIDER)
}
