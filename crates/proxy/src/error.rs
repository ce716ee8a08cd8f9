// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Error handling module
//!
//! Every error that reaches a client is rendered as a JSON-RPC 2.0 error
//! envelope so callers only ever have to parse one response shape.

use std::net::SocketAddr;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use balancer::{BalancerError, DispatchError};
use serde_json::Value;
use shared_types::{JsonRpcError, JsonRpcErrorResponse, error_codes};
use thiserror::Error;

/// Comprehensive error types for server operations
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration validation errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// The balancer could not be built from the configuration
    #[error("Balancer setup failed: {source}")]
    Balancer {
        /// Underlying engine error
        #[from]
        source: BalancerError,
    },

    /// Network binding errors
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        /// Socket address that failed to bind
        address: SocketAddr,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Server startup errors
    #[error("Server startup failed: {source}")]
    Startup {
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Server shutdown errors
    #[error("Server shutdown failed: {source}")]
    Shutdown {
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Task join errors for async operations
    #[error("Task join error: {source}")]
    TaskJoin {
        /// Underlying tokio join error
        #[source]
        source: tokio::task::JoinError,
    },

    /// The body is not valid JSON
    #[error("Parse error: {message}")]
    Parse {
        /// Detailed error message
        message: String,
    },

    /// The body is JSON but not a usable JSON-RPC request
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Request id when one could be read
        id: Value,
        /// Detailed error message
        message: String,
    },

    /// The body exceeds the configured limit
    #[error("Payload too large: {message}")]
    PayloadTooLarge {
        /// Rejection detail
        message: String,
    },

    /// Every upstream attempt failed
    #[error("{source}")]
    Dispatch {
        /// Id of the request being answered
        id: Value,
        /// Engine error
        source: DispatchError,
    },
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    /// HTTP status and JSON-RPC envelope for this error
    fn envelope(&self) -> (StatusCode, JsonRpcErrorResponse) {
        match self {
            ServerError::Parse { message } => (
                StatusCode::BAD_REQUEST,
                JsonRpcErrorResponse::new(
                    Value::Null,
                    JsonRpcError::new(error_codes::PARSE_ERROR, format!("Parse error: {message}")),
                ),
            ),
            ServerError::InvalidRequest { id, message } => (
                StatusCode::BAD_REQUEST,
                JsonRpcErrorResponse::new(
                    id.clone(),
                    JsonRpcError::new(
                        error_codes::INVALID_REQUEST,
                        format!("Invalid request: {message}"),
                    ),
                ),
            ),
            ServerError::PayloadTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                JsonRpcErrorResponse::new(
                    Value::Null,
                    JsonRpcError::new(error_codes::INVALID_REQUEST, self.to_string()),
                ),
            ),
            ServerError::Dispatch { id, source } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                JsonRpcErrorResponse::internal(id.clone(), source),
            ),
            ServerError::Config { .. }
            | ServerError::Balancer { .. }
            | ServerError::Bind { .. }
            | ServerError::Startup { .. }
            | ServerError::Shutdown { .. }
            | ServerError::TaskJoin { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                JsonRpcErrorResponse::internal(Value::Null, self),
            ),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, envelope) = self.envelope();
        (status, Json(envelope)).into_response()
    }
}

/// Convenient From implementations for common async error types
impl From<tokio::task::JoinError> for ServerError {
    fn from(source: tokio::task::JoinError) -> Self {
        Self::TaskJoin { source }
    }
}
