// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Upstream transport abstraction for JSON-RPC node providers
//!
//! The balancer never talks HTTP directly. It hands a request body to an
//! [`UpstreamTransport`] together with the provider endpoint and a deadline, and
//! classifies whatever comes back.
//!
//! # Core Abstractions
//!
//! - **`UpstreamTransport` Trait**: one JSON-RPC round trip against one endpoint
//! - **`TransportError`**: failures below the JSON-RPC layer (connection, status, timeout, body)
//! - **Health types**: `HealthStatus` and probe results reported by the health tracker

use std::time::Duration;

use serde_json::Value;
use shared_types::mentions_rate_limit;
use thiserror::Error;
use url::Url;

pub mod health;

pub use health::*;

/// HTTP status code upstreams use to signal throttling
pub const TOO_MANY_REQUESTS: u16 = 429;

/// A single JSON-RPC round trip to an upstream provider
///
/// Implementations must not retry on their own; the dispatcher owns the retry
/// policy and needs to see every failure.
pub trait UpstreamTransport: Send + Sync {
    /// Send `payload` to `endpoint` and return the parsed response body
    ///
    /// A well-formed JSON-RPC error response is a successful round trip and is
    /// returned as `Ok`. Only failures below the JSON-RPC layer are errors.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure, when `timeout` elapses, on a
    /// non-2xx status or when the body is not valid JSON
    fn send(
        &self,
        endpoint: &Url,
        payload: &Value,
        timeout: Duration,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;

    /// Get the name/identifier of this transport
    fn name(&self) -> &'static str;
}

/// Failures of an upstream round trip
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum TransportError {
    /// Connection or protocol failure
    #[error("HTTP request failed: {message}")]
    Http { message: String },

    /// Upstream answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// No answer within the deadline
    #[error("Request timeout after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Body was not valid JSON
    #[error("Invalid response format: {message}")]
    InvalidResponse { message: String },

    /// Transport could not be constructed
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl TransportError {
    /// Build a timeout error from the deadline that elapsed
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Whether the upstream throttled this call
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Status { status, body } => {
                *status == TOO_MANY_REQUESTS || mentions_rate_limit(body)
            }
            Self::Http { message } | Self::InvalidResponse { message } => {
                mentions_rate_limit(message)
            }
            Self::Timeout { .. } | Self::Configuration { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_rate_limited() {
        let error = TransportError::Status {
            status: 429,
            body: String::new(),
        };
        assert!(error.is_rate_limited());
        assert_eq!(error.to_string(), "HTTP 429: ");
    }

    #[test]
    fn rate_limit_message_is_rate_limited() {
        let error = TransportError::Status {
            status: 503,
            body: "Rate limit exceeded for this key".to_string(),
        };
        assert!(error.is_rate_limited());

        let error = TransportError::Http {
            message: "connection reset".to_string(),
        };
        assert!(!error.is_rate_limited());
    }

    #[test]
    fn timeout_is_not_rate_limited() {
        let error = TransportError::timeout(Duration::from_secs(30));
        assert_eq!(error, TransportError::Timeout { timeout_ms: 30_000 });
        assert!(!error.is_rate_limited());
        assert_eq!(error.to_string(), "Request timeout after 30000 ms");
    }
}
