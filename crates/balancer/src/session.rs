// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Sticky client sessions
//!
//! A client identifier (the caller's source address) is bound to the provider
//! that last served it. Sessions expire after a period of inactivity; expired
//! entries are replaced on access and evicted by the periodic sweep.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::registry::ProviderRegistry;

/// Binding of a client to a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSession {
    /// Registry index of the bound provider
    pub provider: usize,
    /// Last time the session was used
    pub last_used: Instant,
}

impl ClientSession {
    fn is_live(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_used) < ttl
    }
}

/// Concurrent client session map
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, ClientSession>,
    ttl: Duration,
}

impl SessionStore {
    /// Create an empty store with the given inactivity timeout
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Inactivity timeout
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the client's provider, creating or replacing the session if needed
    ///
    /// A live session is refreshed and its provider returned. Otherwise the
    /// highest-priority provider under its error budget is bound. Returns
    /// `None` only when no provider is under budget and no live session exists.
    pub fn get_or_create(&self, client_id: &str, registry: &ProviderRegistry) -> Option<usize> {
        if let Some(provider) = self.touch(client_id) {
            return Some(provider);
        }

        let provider = registry.best_available()?;
        self.bind(client_id, provider);
        debug!(client_id, provider, "session created");
        Some(provider)
    }

    /// Refresh a live session and return its provider
    ///
    /// Idle or unknown clients get `None` and nothing is created.
    pub fn touch(&self, client_id: &str) -> Option<usize> {
        let now = Instant::now();
        let mut session = self.sessions.get_mut(client_id)?;
        if !session.is_live(now, self.ttl) {
            return None;
        }
        session.last_used = now;
        trace!(client_id, provider = session.provider, "session refreshed");
        Some(session.provider)
    }

    /// Bind the client to `provider`, replacing any existing session
    pub fn bind(&self, client_id: &str, provider: usize) {
        self.sessions.insert(
            client_id.to_string(),
            ClientSession {
                provider,
                last_used: Instant::now(),
            },
        );
    }

    /// Current session for a client, live or not
    pub fn get(&self, client_id: &str) -> Option<ClientSession> {
        self.sessions.get(client_id).map(|session| *session)
    }

    /// Evict idle sessions, returning how many were removed
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.is_live(now, self.ttl));
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            debug!(removed, remaining = self.sessions.len(), "evicted idle sessions");
        }
        removed
    }

    /// Number of stored sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is stored
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::sample_pool;

    const TTL: Duration = Duration::from_secs(300);

    #[tokio::test(start_paused = true)]
    async fn creates_session_on_best_provider() {
        let registry = ProviderRegistry::new(sample_pool()).unwrap();
        let store = SessionStore::new(TTL);

        assert_eq!(store.get_or_create("10.0.0.1", &registry), Some(0));
        assert_eq!(store.len(), 1);

        registry.get(0).unwrap().record_failure();
        // live session stays put while the provider is under budget
        assert_eq!(store.get_or_create("10.0.0.1", &registry), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn skips_over_budget_providers_on_creation() {
        let registry = ProviderRegistry::new(sample_pool()).unwrap();
        for _ in 0..5 {
            registry.get(0).unwrap().record_failure();
        }
        let store = SessionStore::new(TTL);
        assert_eq!(store.get_or_create("client", &registry), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn none_when_everything_is_over_budget() {
        let registry = ProviderRegistry::new(sample_pool()).unwrap();
        for provider in registry.providers() {
            for _ in 0..provider.max_errors() {
                provider.record_failure();
            }
        }
        let store = SessionStore::new(TTL);
        assert_eq!(store.get_or_create("client", &registry), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_is_replaced() {
        let registry = ProviderRegistry::new(sample_pool()).unwrap();
        let store = SessionStore::new(TTL);
        store.bind("client", 4);
        assert_eq!(store.get_or_create("client", &registry), Some(4));

        tokio::time::advance(TTL).await;
        assert_eq!(store.get_or_create("client", &registry), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_extends_lifetime() {
        let registry = ProviderRegistry::new(sample_pool()).unwrap();
        let store = SessionStore::new(TTL);
        store.bind("client", 3);

        tokio::time::advance(Duration::from_secs(200)).await;
        assert_eq!(store.get_or_create("client", &registry), Some(3));
        tokio::time::advance(Duration::from_secs(200)).await;
        assert_eq!(store.get_or_create("client", &registry), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn touch_never_creates() {
        let store = SessionStore::new(TTL);
        assert_eq!(store.touch("unknown"), None);
        assert!(store.is_empty());

        store.bind("client", 2);
        tokio::time::advance(Duration::from_secs(200)).await;
        assert_eq!(store.touch("client"), Some(2));
        tokio::time::advance(Duration::from_secs(200)).await;
        assert_eq!(store.touch("client"), Some(2));

        tokio::time::advance(TTL).await;
        assert_eq!(store.touch("client"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_idle_sessions() {
        let registry = ProviderRegistry::new(sample_pool()).unwrap();
        let store = SessionStore::new(TTL);
        store.get_or_create("a", &registry);
        tokio::time::advance(Duration::from_secs(240)).await;
        store.get_or_create("b", &registry);
        tokio::time::advance(Duration::from_secs(60)).await;

        assert_eq!(store.sweep(), 1);
        assert!(store.get("a").is_none());
        assert!(store.get("b").is_some());
    }
}
