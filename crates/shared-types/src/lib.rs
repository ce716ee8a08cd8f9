// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Shared types for the RPC balancer
//!
//! This crate provides the JSON-RPC 2.0 wire types and the static method
//! classification that are shared across the workspace, avoiding circular
//! dependencies between the engine and the HTTP server.

pub mod jsonrpc;
pub mod methods;

pub use jsonrpc::{
    JSONRPC_VERSION, JsonRpcError, JsonRpcErrorResponse, JsonRpcRequest, RequestValidationError,
    error_codes, mentions_rate_limit, stamp_id,
};
pub use methods::{BLOCK_NUMBER_METHOD, CACHEABLE_METHODS, MethodClass, SYNC_CRITICAL_METHODS};
