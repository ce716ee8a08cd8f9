// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Static JSON-RPC method classification
//!
//! The balancer does not interpret method semantics. It only needs to know
//! whether a response may be replayed from cache and whether the answer
//! depends on the provider being at the chain tip.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Method used to probe a provider's chain height
pub const BLOCK_NUMBER_METHOD: &str = "eth_blockNumber";

/// Read-only methods whose responses can be cached for a short TTL
pub const CACHEABLE_METHODS: &[&str] = &[
    BLOCK_NUMBER_METHOD,
    "eth_getBalance",
    "eth_getTransactionCount",
    "eth_getCode",
    "eth_call",
];

/// Methods whose correctness depends on the provider being close to the chain tip
pub const SYNC_CRITICAL_METHODS: &[&str] = &[
    "eth_getBlockByNumber",
    "eth_getTransactionByHash",
    "eth_getTransactionReceipt",
    "eth_getLogs",
];

/// How the balancer treats a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MethodClass {
    /// Responses are cached and replayed within the TTL
    Cacheable,
    /// Routed to providers that are in sync with the highest observed block
    SyncCritical,
    /// Forwarded without special handling
    Standard,
}

impl MethodClass {
    /// Classify a method name (exact, case-sensitive match)
    pub fn of(method: &str) -> Self {
        if CACHEABLE_METHODS.contains(&method) {
            Self::Cacheable
        } else if SYNC_CRITICAL_METHODS.contains(&method) {
            Self::SyncCritical
        } else {
            Self::Standard
        }
    }

    /// Whether responses for this class may be cached
    pub fn is_cacheable(self) -> bool {
        matches!(self, Self::Cacheable)
    }

    /// Whether the selector should prefer providers at the chain tip
    pub fn prefers_sync(self) -> bool {
        matches!(self, Self::SyncCritical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cacheable_methods() {
        for method in CACHEABLE_METHODS {
            assert_eq!(MethodClass::of(method), MethodClass::Cacheable);
            assert!(MethodClass::of(method).is_cacheable());
            assert!(!MethodClass::of(method).prefers_sync());
        }
    }

    #[test]
    fn sync_critical_methods() {
        for method in SYNC_CRITICAL_METHODS {
            assert_eq!(MethodClass::of(method), MethodClass::SyncCritical);
            assert!(MethodClass::of(method).prefers_sync());
            assert!(!MethodClass::of(method).is_cacheable());
        }
    }

    #[test]
    fn everything_else_is_standard() {
        for method in ["eth_sendRawTransaction", "eth_chainId", "net_version", ""] {
            assert_eq!(MethodClass::of(method), MethodClass::Standard);
        }
        // matching is exact
        assert_eq!(MethodClass::of("ETH_BLOCKNUMBER"), MethodClass::Standard);
    }

    #[test]
    fn serde_names() {
        assert_eq!(
            serde_json::to_string(&MethodClass::SyncCritical).unwrap(),
            "\"sync_critical\""
        );
    }
}
