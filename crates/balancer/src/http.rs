// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP transport for upstream JSON-RPC providers

use std::time::Duration;

use reqwest::{
    Client,
    header::{ACCEPT, CONTENT_TYPE},
};
use rpc_client::{TransportError, UpstreamTransport};
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, trace};
use url::Url;

const USER_AGENT: &str = concat!("rpc-balancer/", env!("CARGO_PKG_VERSION"));
const APPLICATION_JSON: &str = "application/json";

/// `reqwest`-backed [`UpstreamTransport`]
///
/// The client is shared by every provider; per-call deadlines are applied with
/// [`tokio::time::timeout`] so probes and forwarded calls can differ.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with a fresh connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Configuration {
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl UpstreamTransport for HttpTransport {
    async fn send(
        &self,
        endpoint: &Url,
        payload: &Value,
        deadline: Duration,
    ) -> Result<Value, TransportError> {
        trace!(%endpoint, "forwarding request");

        let request = self
            .client
            .post(endpoint.clone())
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .header(ACCEPT, APPLICATION_JSON)
            .json(payload);

        let exchange = async {
            let response = request.send().await.map_err(|e| TransportError::Http {
                message: e.to_string(),
            })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                debug!(%endpoint, status = status.as_u16(), "upstream returned error status");
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let bytes = response.bytes().await.map_err(|e| TransportError::Http {
                message: e.to_string(),
            })?;
            serde_json::from_slice::<Value>(&bytes).map_err(|e| {
                TransportError::InvalidResponse {
                    message: e.to_string(),
                }
            })
        };

        timeout(deadline, exchange)
            .await
            .map_err(|_| TransportError::timeout(deadline))?
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
