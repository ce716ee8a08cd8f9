// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Request extractors
//!
//! [`JsonRpc`] turns a request body into a validated [`JsonRpcRequest`],
//! rejecting with JSON-RPC parse and invalid-request errors instead of
//! axum's plain-text rejections. [`ClientAddr`] supplies the session key.

use std::{convert::Infallible, net::SocketAddr};

use axum::{
    body::Bytes,
    extract::{ConnectInfo, FromRequest, FromRequestParts, Request},
    http::{StatusCode, header, request::Parts},
};
use serde_json::Value;
use shared_types::JsonRpcRequest;

use crate::error::ServerError;

mod error_hints {
    pub const MISSING_COMMA: &str =
        "check for missing or extra commas between object properties or array elements";
    pub const MISSING_BRACE: &str = "check for missing closing brace '}' for JSON object";
    pub const MISSING_BRACKET: &str = "check for missing closing bracket ']' for JSON array";
    pub const MISSING_QUOTES: &str =
        "check for missing or improperly escaped quotes around string values";
    pub const CONTROL_CHARS: &str = "JSON contains invalid control characters that must be escaped";
    pub const EXPECTED_VALUE: &str =
        "expected a valid JSON value (string, number, boolean, null, object, or array)";
    pub const DEFAULT_SYNTAX: &str = "check JSON formatting and structure";
    pub const EMPTY_BODY: &str = "request body is empty, expected a JSON-RPC request object";
    pub const TRUNCATED_JSON: &str =
        "unexpected end of JSON input, request appears to be truncated";
    pub const BATCH: &str = "batch requests are not supported, send one request object per call";
    pub const NOT_AN_OBJECT: &str = "expected a JSON-RPC request object";
}

/// A single validated JSON-RPC request taken from the body
#[derive(Debug)]
pub struct JsonRpc(pub JsonRpcRequest);

impl<S> FromRequest<S> for JsonRpc
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(content_type) = req.headers().get(header::CONTENT_TYPE)
            && let Ok(content_type_str) = content_type.to_str()
            && !content_type_str.starts_with("application/json")
        {
            return Err(ServerError::InvalidRequest {
                id: Value::Null,
                message: format!(
                    "invalid content-type: expected 'application/json', got '{content_type_str}'"
                ),
            });
        }

        let bytes = match Bytes::from_request(req, state).await {
            Ok(bytes) => bytes,
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(ServerError::PayloadTooLarge {
                    message: rejection.body_text(),
                });
            }
            Err(rejection) => {
                return Err(ServerError::Parse {
                    message: format!("failed to read request body: {rejection}"),
                });
            }
        };

        parse_request(&bytes).map(JsonRpc)
    }
}

/// Parse and validate a raw body
///
/// Syntax errors are parse errors. Anything that is valid JSON but not a
/// usable request object is an invalid request, carrying the caller's id when
/// one can be read.
fn parse_request(bytes: &[u8]) -> Result<JsonRpcRequest, ServerError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ServerError::Parse {
            message: error_hints::EMPTY_BODY.to_string(),
        });
    }

    let value: Value = serde_json::from_slice(bytes).map_err(|err| ServerError::Parse {
        message: describe_syntax_error(&err),
    })?;

    let id = match &value {
        Value::Object(object) => object.get("id").cloned().unwrap_or(Value::Null),
        Value::Array(_) => {
            return Err(ServerError::InvalidRequest {
                id: Value::Null,
                message: error_hints::BATCH.to_string(),
            });
        }
        _ => {
            return Err(ServerError::InvalidRequest {
                id: Value::Null,
                message: error_hints::NOT_AN_OBJECT.to_string(),
            });
        }
    };

    let request: JsonRpcRequest =
        serde_json::from_value(value).map_err(|err| ServerError::InvalidRequest {
            id: id.clone(),
            message: data_validation_hint(&err),
        })?;

    request
        .validate()
        .map_err(|err| ServerError::InvalidRequest {
            id,
            message: err.to_string(),
        })?;

    Ok(request)
}

fn describe_syntax_error(err: &serde_json::Error) -> String {
    if err.is_eof() {
        return error_hints::TRUNCATED_JSON.to_string();
    }
    format!(
        "invalid JSON syntax at line {}, column {}: {}",
        err.line(),
        err.column(),
        json_syntax_hint(err)
    )
}

/// Provides helpful hints for JSON syntax errors
fn json_syntax_hint(err: &serde_json::Error) -> &'static str {
    let err_msg = err.to_string();

    if err_msg.contains("expected ','") || err_msg.contains("trailing comma") {
        error_hints::MISSING_COMMA
    } else if err_msg.contains("expected '}'") {
        error_hints::MISSING_BRACE
    } else if err_msg.contains("expected ']'") {
        error_hints::MISSING_BRACKET
    } else if err_msg.contains("expected '\"'") {
        error_hints::MISSING_QUOTES
    } else if err_msg.contains("control character") {
        error_hints::CONTROL_CHARS
    } else if err_msg.contains("expected value") {
        error_hints::EXPECTED_VALUE
    } else {
        error_hints::DEFAULT_SYNTAX
    }
}

/// Provides helpful hints for request-shape errors
fn data_validation_hint(err: &serde_json::Error) -> String {
    let err_msg = err.to_string();

    if err_msg.contains("missing field") {
        format!("required field is missing: {err_msg}")
    } else if err_msg.contains("invalid type") && err_msg.contains("expected a string") {
        format!("`method` and `jsonrpc` must be strings: {err_msg}")
    } else {
        err_msg
    }
}

/// Identity of the caller used for sticky sessions
///
/// The peer IP address when the server was started with connection info,
/// `None` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub Option<String>);

impl ClientAddr {
    /// The session key, if any
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(Self(addr))
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use axum::{
        body::Body,
        http::{HeaderValue, Method},
    };
    use serde_json::json;

    use super::*;

    fn create_request(body: &str) -> Request {
        let mut req = Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(Body::from(body.to_string()))
            .unwrap();

        req.headers_mut()
            .insert("content-type", HeaderValue::from_static("application/json"));

        req
    }

    async fn extract(body: &str) -> Result<JsonRpcRequest, ServerError> {
        JsonRpc::from_request(create_request(body), &())
            .await
            .map(|JsonRpc(request)| request)
    }

    #[tokio::test]
    async fn valid_request() {
        let request = extract(r#"{"jsonrpc":"2.0","method":"eth_getBalance","params":["0xabc","latest"],"id":3}"#)
            .await
            .unwrap();

        assert_eq!(request.method, "eth_getBalance");
        assert_eq!(request.params, json!(["0xabc", "latest"]));
        assert_eq!(request.id, json!(3));
    }

    #[tokio::test]
    async fn empty_body_is_parse_error() {
        match extract("  ").await.unwrap_err() {
            ServerError::Parse { message } => assert!(message.contains("request body is empty")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn syntax_error_is_parse_error() {
        match extract(r#"{"method": "eth_chainId",, "id": 1}"#).await.unwrap_err() {
            ServerError::Parse { message } => {
                assert!(message.contains("invalid JSON syntax"));
                assert!(message.contains("line"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn truncated_body_is_parse_error() {
        match extract(r#"{"method": "eth_chainId""#).await.unwrap_err() {
            ServerError::Parse { message } => {
                assert!(message.contains("unexpected end of JSON input"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_method_keeps_id() {
        match extract(r#"{"jsonrpc":"2.0","id":"req-9"}"#).await.unwrap_err() {
            ServerError::InvalidRequest { id, message } => {
                assert_eq!(id, json!("req-9"));
                assert!(message.contains("required field is missing"));
            }
            other => panic!("expected invalid request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn batch_is_rejected() {
        let body = r#"[{"jsonrpc":"2.0","method":"eth_chainId","id":1}]"#;
        match extract(body).await.unwrap_err() {
            ServerError::InvalidRequest { id, message } => {
                assert_eq!(id, Value::Null);
                assert!(message.contains("batch"));
            }
            other => panic!("expected invalid request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_version_is_invalid() {
        let body = r#"{"jsonrpc":"1.0","method":"eth_chainId","id":1}"#;
        assert!(matches!(
            extract(body).await.unwrap_err(),
            ServerError::InvalidRequest { .. }
        ));
    }

    #[tokio::test]
    async fn wrong_content_type() {
        let mut req = create_request(r#"{"method":"eth_chainId"}"#);
        req.headers_mut()
            .insert("content-type", HeaderValue::from_static("text/plain"));

        let error = JsonRpc::from_request(req, &()).await.unwrap_err();
        assert!(matches!(error, ServerError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn client_addr_from_connect_info() {
        let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
        req.extensions_mut().insert(ConnectInfo(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
            51234,
        )));
        let (mut parts, _) = req.into_parts();

        let ClientAddr(addr) = ClientAddr::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(addr.as_deref(), Some("10.0.0.7"));
    }

    #[tokio::test]
    async fn client_addr_absent_without_connect_info() {
        let (mut parts, _) = Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap()
            .into_parts();

        let client = ClientAddr::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(client.as_deref(), None);
    }
}
