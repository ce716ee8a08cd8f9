// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! `OpenAPI` documentation module
//!
//! This module provides `OpenAPI` specification and `Swagger UI` endpoints for API documentation.

use axum::{Json, http::StatusCode, response::Html};
use balancer::{BalancerSnapshot, CacheStats, ProviderHealth, ProviderStats, StatsSnapshot};
use rpc_client::{HealthStatus, SyncStatus};
use shared_types::{JsonRpcError, JsonRpcErrorResponse, JsonRpcRequest};
use utoipa::OpenApi;

use crate::{
    config::Environment,
    routes::handlers,
    state::{HealthCheck, StatsReport},
};

/// `OpenAPI` document for the proxy
#[derive(OpenApi)]
#[openapi(
    info(
        title = "RPC Balancer",
        description = "Load-balancing JSON-RPC proxy for blockchain node providers"
    ),
    paths(handlers::rpc_handler, handlers::health_handler, handlers::stats_handler),
    components(schemas(
        JsonRpcRequest,
        JsonRpcError,
        JsonRpcErrorResponse,
        HealthCheck,
        StatsReport,
        BalancerSnapshot,
        ProviderHealth,
        StatsSnapshot,
        ProviderStats,
        CacheStats,
        HealthStatus,
        SyncStatus,
        Environment
    )),
    tags(
        (name = "rpc", description = "JSON-RPC forwarding"),
        (name = "diagnostics", description = "Pool health and statistics")
    )
)]
#[derive(Debug)]
pub struct ApiDoc;

/// `OpenAPI` specification endpoint
pub async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Swagger UI endpoint
pub async fn swagger_ui() -> Result<Html<&'static str>, StatusCode> {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>RPC Balancer API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css" />
    <style>
        html { box-sizing: border-box; overflow: -moz-scrollbars-vertical; overflow-y: scroll; }
        *, *:before, *:after { box-sizing: inherit; }
        body { margin:0; background: #fafafa; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            SwaggerUIBundle({
                url: '/api-doc/openapi.json',
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                plugins: [
                    SwaggerUIBundle.plugins.DownloadUrl
                ],
                layout: "StandaloneLayout"
            });
        }
    </script>
</body>
</html>
"#;
    Ok(Html(html))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_endpoints() {
        let doc = ApiDoc::openapi();
        for path in ["/", "/health", "/stats"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let schemas = doc.components.unwrap().schemas;
        assert!(schemas.contains_key("JsonRpcRequest"));
        assert!(schemas.contains_key("BalancerSnapshot"));
    }
}
