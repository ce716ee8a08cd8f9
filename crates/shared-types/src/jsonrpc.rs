// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! JSON-RPC 2.0 wire types
//!
//! Requests are parsed into [`JsonRpcRequest`] at the HTTP boundary and
//! forwarded upstream unchanged. Upstream responses are kept as raw
//! [`serde_json::Value`]s so they can be replayed byte-for-byte; only the error
//! member is inspected through [`JsonRpcError::from_response`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

/// Protocol version string carried by every request and response
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC error codes understood by the balancer
pub mod error_codes {
    /// Invalid JSON was received
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON sent is not a valid request object
    pub const INVALID_REQUEST: i64 = -32600;
    /// Internal JSON-RPC error
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Request limit exceeded (EIP-1474)
    pub const LIMIT_EXCEEDED: i64 = -32005;
    /// Provider-specific rate limit code used by several hosted node services
    pub const RATE_LIMITED: i64 = -32007;
}

static RATE_LIMIT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?i)rate[\s_-]?limit").expect("rate limit pattern is a valid regex")
});

/// Returns true when an error message reads like an upstream rate limit
pub fn mentions_rate_limit(message: &str) -> bool {
    RATE_LIMIT_PATTERN.is_match(message)
}

/// Inbound JSON-RPC request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JsonRpcRequest {
    /// Protocol version, expected to be `"2.0"`
    #[serde(default = "default_version")]
    #[schema(example = "2.0")]
    pub jsonrpc: String,
    /// Method name
    #[schema(example = "eth_blockNumber")]
    pub method: String,
    /// Positional or named parameters
    #[serde(default, skip_serializing_if = "Value::is_null")]
    #[schema(value_type = Object, example = json!([]))]
    pub params: Value,
    /// Caller-chosen request id, `null` when absent
    #[serde(default)]
    #[schema(value_type = Object, example = 1)]
    pub id: Value,
}

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// Structural problems with an inbound request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestValidationError {
    /// The method name is empty
    #[error("method name cannot be empty")]
    EmptyMethod,
    /// The protocol version is not 2.0
    #[error("unsupported jsonrpc version '{0}', expected \"2.0\"")]
    UnsupportedVersion(String),
}

impl JsonRpcRequest {
    /// Create a request with the given method, params and id
    pub fn new(method: impl Into<String>, params: Value, id: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            method: method.into(),
            params,
            id,
        }
    }

    /// Check that the request is a well-formed JSON-RPC 2.0 call
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if self.method.trim().is_empty() {
            return Err(RequestValidationError::EmptyMethod);
        }
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(RequestValidationError::UnsupportedVersion(
                self.jsonrpc.clone(),
            ));
        }
        Ok(())
    }
}

/// The `error` member of a JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JsonRpcError {
    /// Error code
    pub code: i64,
    /// Human-readable message
    pub message: String,
    /// Optional provider-specific payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create an error without additional data
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Extract the error member from an upstream response body
    ///
    /// Returns `None` only when the member is absent or null. Malformed error
    /// members keep whatever code and text they carry; a missing code becomes
    /// [`error_codes::INTERNAL_ERROR`].
    pub fn from_response(response: &Value) -> Option<Self> {
        let error = response.get("error")?;
        if error.is_null() {
            return None;
        }
        if let Ok(parsed) = serde_json::from_value(error.clone()) {
            return Some(parsed);
        }
        let code = error
            .get("code")
            .and_then(Value::as_i64)
            .unwrap_or(error_codes::INTERNAL_ERROR);
        let message = match error {
            Value::String(text) => text.clone(),
            Value::Object(fields) => fields
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| error.to_string(), str::to_owned),
            other => other.to_string(),
        };
        Some(Self {
            code,
            message,
            data: error.get("data").cloned(),
        })
    }

    /// Whether the upstream is signalling that it throttled the call
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self.code,
            error_codes::LIMIT_EXCEEDED | error_codes::RATE_LIMITED
        ) || mentions_rate_limit(&self.message)
    }
}

/// A complete JSON-RPC error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JsonRpcErrorResponse {
    /// Protocol version
    pub jsonrpc: String,
    /// Error detail
    pub error: JsonRpcError,
    /// Id of the request this answers, `null` if unknown
    #[schema(value_type = Object)]
    pub id: Value,
}

impl JsonRpcErrorResponse {
    /// Build an error response for the given request id
    pub fn new(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: default_version(),
            error,
            id,
        }
    }

    /// Internal error envelope (`-32603`) used when every attempt failed
    pub fn internal(id: Value, message: impl std::fmt::Display) -> Self {
        Self::new(
            id,
            JsonRpcError::new(
                error_codes::INTERNAL_ERROR,
                format!("Internal error: {message}"),
            ),
        )
    }
}

/// Replace the `id` member of a response object with the caller's id
pub fn stamp_id(response: &mut Value, id: &Value) {
    if let Some(object) = response.as_object_mut() {
        object.insert("id".to_string(), id.clone());
    }
}
