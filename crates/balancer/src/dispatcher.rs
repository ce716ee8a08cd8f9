// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Request dispatch
//!
//! [`Balancer`] owns the engine state and runs one logical request through
//! cache lookup and the attempt loop:
//!
//! ```text
//! PENDING ──cache hit──▶ DONE
//!    │
//!    ▼
//! ATTEMPTING ──success / rpc error──▶ DONE
//!    │  ▲
//!    │  └── retryable failure, backoff
//!    ▼
//! EXHAUSTED ──▶ DONE(error)
//! ```

use std::{sync::Arc, time::Duration};

use rand::Rng;
use rpc_client::{TransportError, UpstreamTransport};
use serde_json::Value;
use shared_types::{JsonRpcError, JsonRpcRequest, MethodClass, stamp_id};
use thiserror::Error;
use tokio::{
    task::JoinHandle,
    time::{Instant, interval_at, sleep},
};
use tokio_retry::strategy::ExponentialBackoff;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    cache::ResponseCache,
    config::{BalancerConfig, ConfigError},
    health::HealthTracker,
    http::HttpTransport,
    rate_limit,
    registry::ProviderRegistry,
    selector::select_provider,
    session::SessionStore,
    snapshot::{BalancerSnapshot, ProviderHealth},
    stats::RequestStats,
};

/// Errors that cross the engine boundary
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum DispatchError {
    /// Every attempt failed
    #[error("{last_error}")]
    Exhausted { attempts: u32, last_error: String },

    /// The request could not be serialized for forwarding
    #[error("failed to encode request: {message}")]
    Encode { message: String },
}

/// Errors raised while building a [`Balancer`]
#[derive(Debug, Error)]
pub enum BalancerError {
    /// Configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP transport could not be created
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// How a request was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A provider returned a result
    Success,
    /// A provider returned a non-retryable JSON-RPC error, passed through unchanged
    RpcError,
    /// Replayed from the response cache
    CacheHit,
}

impl DispatchOutcome {
    /// Short label for logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::RpcError => "rpc_error",
            Self::CacheHit => "cache_hit",
        }
    }
}

/// Answer to one inbound request
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    /// Response body to return to the caller
    pub response: Value,
    /// How the response was obtained
    pub outcome: DispatchOutcome,
    /// Name of the provider that answered, `None` for cache hits
    pub provider: Option<String>,
    /// Attempts made, zero for cache hits
    pub attempts: u32,
}

/// Classified result of one attempt
enum Attempt {
    Answer(Value),
    RpcError(Value),
    Retry { error: String, rate_limited: bool },
}

impl Attempt {
    fn classify(result: Result<Value, TransportError>) -> Self {
        match result {
            Ok(response) => match JsonRpcError::from_response(&response) {
                None => Attempt::Answer(response),
                Some(rpc_error) if rpc_error.is_rate_limit() => Attempt::Retry {
                    error: format!("RPC error {}: {}", rpc_error.code, rpc_error.message),
                    rate_limited: true,
                },
                Some(_) => Attempt::RpcError(response),
            },
            Err(error) => Attempt::Retry {
                rate_limited: error.is_rate_limited(),
                error: error.to_string(),
            },
        }
    }
}

/// Load-balancing JSON-RPC engine
#[derive(Debug)]
pub struct Balancer<T = HttpTransport> {
    registry: Arc<ProviderRegistry>,
    transport: Arc<T>,
    sessions: SessionStore,
    cache: ResponseCache,
    stats: RequestStats,
    config: BalancerConfig,
}

impl Balancer<HttpTransport> {
    /// Build an engine that forwards over HTTP
    pub fn new(config: BalancerConfig) -> Result<Self, BalancerError> {
        let transport = HttpTransport::new()?;
        Ok(Self::with_transport(config, transport)?)
    }
}

impl<T> Balancer<T>
where
    T: UpstreamTransport + 'static,
{
    /// Build an engine over a custom transport
    pub fn with_transport(config: BalancerConfig, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = ProviderRegistry::new(config.providers.iter().cloned())?;
        info!(
            providers = registry.len(),
            max_retries = config.max_retries,
            "balancer initialized"
        );

        Ok(Self {
            stats: RequestStats::new(registry.len()),
            registry: Arc::new(registry),
            transport: Arc::new(transport),
            sessions: SessionStore::new(config.session_ttl),
            cache: ResponseCache::new(config.cache_ttl),
            config,
        })
    }

    /// Provider registry
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Client sessions
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Response cache
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Request counters
    pub fn stats(&self) -> &RequestStats {
        &self.stats
    }

    /// Active configuration
    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    /// Pick a provider the way the next attempt would
    pub fn select_provider(&self, client_id: Option<&str>, prefer_sync: bool) -> usize {
        select_provider(&self.registry, &self.sessions, client_id, prefer_sync)
    }

    /// Serve one request
    ///
    /// The client identifier is used for sticky selection on the first attempt;
    /// retries go through plain priority selection. Non-retryable JSON-RPC errors
    /// are returned as `Ok` with [`DispatchOutcome::RpcError`].
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Exhausted`] when every attempt failed
    pub async fn handle(
        &self,
        request: &JsonRpcRequest,
        client_id: Option<&str>,
    ) -> Result<Dispatched, DispatchError> {
        self.stats.record_request();

        let cache_key = ResponseCache::cache_key(request);
        if let Some(key) = &cache_key
            && let Some(mut response) = self.cache.get(key)
        {
            stamp_id(&mut response, &request.id);
            self.stats.record_cache_hit();
            debug!(method = %request.method, "served from cache");
            return Ok(Dispatched {
                response,
                outcome: DispatchOutcome::CacheHit,
                provider: None,
                attempts: 0,
            });
        }

        let prefer_sync = MethodClass::of(&request.method).prefers_sync();
        let payload = serde_json::to_value(request).map_err(|e| DispatchError::Encode {
            message: e.to_string(),
        })?;

        let max_retries = self.config.max_retries;
        let mut backoff = self.backoff_schedule();
        let mut last_error = String::from("no attempt was made");

        for attempt in 1..=max_retries {
            let sticky = if attempt == 1 { client_id } else { None };
            let index = self.select_provider(sticky, prefer_sync);
            let provider = &self.registry.providers()[index];

            rate_limit::acquire(provider).await;
            let result = self
                .transport
                .send(provider.url(), &payload, self.config.request_timeout)
                .await;

            let (response, outcome) = match Attempt::classify(result) {
                Attempt::Answer(response) => (response, DispatchOutcome::Success),
                Attempt::RpcError(response) => (response, DispatchOutcome::RpcError),
                Attempt::Retry {
                    error,
                    rate_limited,
                } => {
                    provider.record_failure();
                    self.stats.record_attempt_failure(index);
                    warn!(
                        provider = %provider.name(),
                        method = %request.method,
                        attempt,
                        max_retries,
                        rate_limited,
                        %error,
                        "attempt failed"
                    );
                    last_error = error;

                    if attempt < max_retries {
                        let mut delay = backoff.next().unwrap_or(self.config.backoff_max);
                        if rate_limited {
                            delay += self.rate_limit_cooldown();
                        }
                        sleep(delay).await;
                    }
                    continue;
                }
            };

            if outcome == DispatchOutcome::Success {
                provider.record_success();
                if let Some(key) = cache_key {
                    self.cache.put(key, response.clone());
                }
            }
            self.stats.record_success(index);
            if let Some(client_id) = client_id {
                self.sessions.bind(client_id, index);
            }

            debug!(
                provider = %provider.name(),
                method = %request.method,
                attempt,
                outcome = outcome.as_str(),
                "request served"
            );
            return Ok(Dispatched {
                response,
                outcome,
                provider: Some(provider.name().to_string()),
                attempts: attempt,
            });
        }

        self.stats.record_exhausted();
        error!(
            method = %request.method,
            attempts = max_retries,
            error = %last_error,
            "all attempts failed"
        );
        Err(DispatchError::Exhausted {
            attempts: max_retries,
            last_error,
        })
    }

    /// Delays between attempts: `base`, `2 × base`, `4 × base`, … capped at the maximum
    ///
    /// The base is applied in whole milliseconds.
    fn backoff_schedule(&self) -> impl Iterator<Item = Duration> {
        let base_ms = u64::try_from(self.config.backoff_base.as_millis()).unwrap_or(u64::MAX);
        let max = self.config.backoff_max;
        // the strategy starts at 2 × base
        ExponentialBackoff::from_millis(2)
            .factor(base_ms)
            .map(move |delay| (delay / 2).min(max))
    }

    /// Extra wait after a rate-limited attempt
    fn rate_limit_cooldown(&self) -> Duration {
        let (min, max) = (
            self.config.rate_limit_cooldown_min,
            self.config.rate_limit_cooldown_max,
        );
        if min >= max {
            return min;
        }
        rand::rng().random_range(min..=max)
    }

    /// Evict expired cache entries and idle sessions
    pub fn sweep(&self) -> (usize, usize) {
        let entries = self.cache.sweep();
        let sessions = self.sessions.sweep();
        debug!(
            cache_evicted = entries,
            sessions_evicted = sessions,
            "maintenance sweep complete"
        );
        (entries, sessions)
    }

    /// Diagnostics snapshot of providers, counters and store sizes
    pub fn snapshot(&self) -> BalancerSnapshot {
        let max_height = self.registry.max_block_height();
        let providers = self
            .registry
            .providers()
            .iter()
            .map(|provider| ProviderHealth::from_provider(provider, max_height))
            .collect();
        BalancerSnapshot::new(
            providers,
            self.stats.snapshot(&self.registry),
            self.cache.len(),
            self.sessions.len(),
        )
    }

    /// Start the health tracker and the maintenance sweeper
    ///
    /// Both tasks stop when `shutdown` is cancelled.
    pub fn spawn_background(self: &Arc<Self>, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
        let tracker = HealthTracker::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.transport),
            self.config.health_check(),
        );
        let health = tracker.spawn(shutdown.child_token());

        let balancer = Arc::clone(self);
        let token = shutdown.child_token();
        let maintenance = tokio::spawn(async move {
            let period = balancer.config.sweep_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        balancer.sweep();
                    }
                    () = token.cancelled() => {
                        info!("maintenance sweeper shutting down");
                        break;
                    }
                }
            }
        });

        vec![health, maintenance]
    }
}
