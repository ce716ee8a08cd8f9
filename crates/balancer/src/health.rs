// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Background chain-height probing
//!
//! Every interval each provider is asked for `eth_blockNumber` concurrently.
//! Successful probes update the provider's observed height and check time;
//! failures are logged and leave prior values (and the error budget) alone.
//! After each round the height spread is compared against the allowed lag and
//! lagging providers are reported.

use std::{sync::Arc, time::Duration};

use alloy_primitives::U64;
use rpc_client::{HealthCheckConfig, ProbeResult, TransportError, UpstreamTransport};
use serde_json::json;
use shared_types::{BLOCK_NUMBER_METHOD, JsonRpcError, JsonRpcRequest};
use thiserror::Error;
use tokio::{
    task::{JoinHandle, JoinSet},
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::{Provider, ProviderRegistry};

/// Reasons a probe produced no height
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ProbeError {
    /// The round trip failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The provider answered with a JSON-RPC error
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The result was not a hex quantity
    #[error("invalid block number: {message}")]
    InvalidHeight { message: String },
}

/// Ask one provider for its chain height
pub async fn probe_block_height<T: UpstreamTransport>(
    transport: &T,
    provider: &Provider,
    timeout: Duration,
) -> Result<ProbeResult, ProbeError> {
    let request = JsonRpcRequest::new(BLOCK_NUMBER_METHOD, json!([]), json!(1));
    let payload = serde_json::to_value(&request).map_err(|e| ProbeError::InvalidHeight {
        message: e.to_string(),
    })?;

    let started = Instant::now();
    let response = transport.send(provider.url(), &payload, timeout).await?;
    let response_time = started.elapsed();

    if let Some(JsonRpcError { code, message, .. }) = JsonRpcError::from_response(&response) {
        return Err(ProbeError::Rpc { code, message });
    }

    let result = response
        .get("result")
        .cloned()
        .ok_or_else(|| ProbeError::InvalidHeight {
            message: "missing result".to_string(),
        })?;
    let height: U64 = serde_json::from_value(result).map_err(|e| ProbeError::InvalidHeight {
        message: e.to_string(),
    })?;

    Ok(ProbeResult::new(height.to::<u64>(), response_time))
}

/// Summary of one probe round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeRound {
    /// Providers that answered with a height
    pub succeeded: usize,
    /// Providers that did not
    pub failed: usize,
    /// Highest known height after the round
    pub max_height: Option<u64>,
    /// Lowest known height after the round
    pub min_height: Option<u64>,
    /// Providers trailing the highest height by more than the allowed lag
    pub lagging: Vec<String>,
}

/// Periodic chain-height prober
#[derive(Debug)]
pub struct HealthTracker<T> {
    registry: Arc<ProviderRegistry>,
    transport: Arc<T>,
    config: HealthCheckConfig,
}

impl<T> HealthTracker<T>
where
    T: UpstreamTransport + 'static,
{
    /// Create a tracker over a shared registry and transport
    pub fn new(
        registry: Arc<ProviderRegistry>,
        transport: Arc<T>,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            config,
        }
    }

    /// Probe every provider once and report lag
    pub async fn check_all(&self) -> ProbeRound {
        let mut probes = JoinSet::new();
        for index in 0..self.registry.len() {
            let registry = Arc::clone(&self.registry);
            let transport = Arc::clone(&self.transport);
            let timeout = self.config.timeout;
            probes.spawn(async move {
                let Some(provider) = registry.get(index) else {
                    return false;
                };
                match probe_block_height(transport.as_ref(), provider, timeout).await {
                    Ok(probe) => {
                        debug!(
                            provider = %provider.name(),
                            height = probe.block_height,
                            response_time_ms = probe.response_time.as_millis(),
                            "health probe succeeded"
                        );
                        provider.record_probe(&probe);
                        true
                    }
                    Err(error) => {
                        warn!(provider = %provider.name(), %error, "health probe failed");
                        false
                    }
                }
            });
        }

        let mut round = ProbeRound::default();
        while let Some(outcome) = probes.join_next().await {
            match outcome {
                Ok(true) => round.succeeded += 1,
                Ok(false) => round.failed += 1,
                Err(error) => {
                    warn!(%error, "health probe task failed");
                    round.failed += 1;
                }
            }
        }

        round.max_height = self.registry.max_block_height();
        round.min_height = self.registry.min_block_height();
        if let (Some(max), Some(min)) = (round.max_height, round.min_height)
            && max - min > self.config.max_block_lag
        {
            for (_, provider) in self.registry.iter() {
                if let Some(height) = provider.block_height()
                    && max - height > self.config.max_block_lag
                {
                    warn!(
                        provider = %provider.name(),
                        height,
                        max_height = max,
                        behind = max - height,
                        "provider is lagging behind the chain tip"
                    );
                    round.lagging.push(provider.name().to_string());
                }
            }
        }

        round
    }

    /// Run probe rounds every interval until `shutdown` is cancelled
    ///
    /// The first round runs one interval after the call.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.config.interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = period.as_millis(), "health tracker started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let round = self.check_all().await;
                        debug!(
                            succeeded = round.succeeded,
                            failed = round.failed,
                            max_height = ?round.max_height,
                            "health probe round complete"
                        );
                    }
                    () = shutdown.cancelled() => {
                        info!("health tracker shutting down");
                        break;
                    }
                }
            }
        })
    }
}
