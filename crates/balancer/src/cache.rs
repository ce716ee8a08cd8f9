// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Short-lived cache for read-only JSON-RPC responses
//!
//! Only methods classified as cacheable are stored. Entries are keyed by the
//! method name and the exact serialized parameters, expire after a fixed TTL,
//! and are evicted lazily on lookup and by the periodic sweep.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{JsonRpcRequest, MethodClass};
use tokio::time::Instant;
use tracing::{debug, trace};
use utoipa::ToSchema;

/// Cached upstream response
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// Response body as received from the provider
    pub response: Value,
    /// When the response was stored
    pub cached_at: Instant,
    /// How many times the entry was replayed
    pub access_count: u64,
}

impl CachedResponse {
    fn new(response: Value) -> Self {
        Self {
            response,
            cached_at: Instant::now(),
            access_count: 0,
        }
    }

    /// Whether the entry is younger than `ttl`
    pub fn is_valid(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() < ttl
    }
}

/// Response cache keyed by method and parameters
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, CachedResponse>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    expired: AtomicU64,
}

impl ResponseCache {
    /// Create an empty cache
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    /// Cache key for a request, `None` if the method is not cacheable
    ///
    /// Parameters are compared exactly: `["0xabc", "latest"]` and
    /// `["0xABC", "latest"]` are different keys, and object members keep the
    /// order the client sent them in.
    pub fn cache_key(request: &JsonRpcRequest) -> Option<String> {
        if !MethodClass::of(&request.method).is_cacheable() {
            return None;
        }
        Some(format!("{}:{}", request.method, request.params))
    }

    /// Look up a live entry, evicting it if it has expired
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(mut cached) = self.entries.get_mut(key) {
            if cached.is_valid(self.ttl) {
                cached.access_count += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key, access_count = cached.access_count, "cache hit");
                return Some(cached.response.clone());
            }
            drop(cached);
            self.entries.remove(key);
            self.expired.fetch_add(1, Ordering::Relaxed);
            trace!(key, "expired cache entry removed");
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a response, replacing any previous entry for the key
    pub fn put(&self, key: String, response: Value) {
        self.entries.insert(key, CachedResponse::new(response));
        self.stores.fetch_add(1, Ordering::Relaxed);
    }

    /// Evict expired entries, returning how many were removed
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, cached| cached.is_valid(self.ttl));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.expired.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(
                removed,
                remaining = self.entries.len(),
                "evicted expired cache entries"
            );
        }
        removed
    }

    /// Number of stored entries, including not yet evicted expired ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counters and hit rate since startup
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if lookups > 0 {
            hits as f64 / lookups as f64
        } else {
            0.0
        };

        CacheStats {
            entry_count: self.entries.len(),
            hits,
            misses,
            stores: self.stores.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            hit_rate,
            ttl_ms: u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CacheStats {
    /// Number of stored entries
    pub entry_count: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing live
    pub misses: u64,
    /// Responses stored
    pub stores: u64,
    /// Entries removed after their TTL
    pub expired: u64,
    /// Hit rate (0.0 to 1.0)
    pub hit_rate: f64,
    /// Entry lifetime in milliseconds
    pub ttl_ms: u64,
}
