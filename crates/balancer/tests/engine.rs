// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! End-to-end engine tests over real HTTP against mock providers

use std::sync::Arc;

use balancer::{
    Balancer, DispatchError, DispatchOutcome, HealthTracker, HttpTransport, ProviderRegistry,
};
use serde_json::json;
use shared_types::JsonRpcRequest;
use wiremock::MockServer;

mod fixtures;
use fixtures::*;

#[tokio::test]
async fn fails_over_to_next_provider() {
    let primary = MockServer::start().await;
    let backup = MockServer::start().await;
    mount_status(&primary, 500).await;
    mount_rpc(&backup, "eth_chainId", rpc_result(json!("0x1"))).await;

    // primary tolerates a single error so the retry moves on
    let config = fast_config(vec![
        provider("primary", &primary, 1, 1),
        provider("backup", &backup, 3, 2),
    ]);
    let balancer = Balancer::new(config).unwrap();
    let request = JsonRpcRequest::new("eth_chainId", json!([]), json!(5));

    let answer = balancer.handle(&request, None).await.unwrap();
    assert_eq!(answer.provider.as_deref(), Some("backup"));
    assert_eq!(answer.attempts, 2);
    assert_eq!(answer.response["result"], "0x1");

    let snapshot = balancer.snapshot();
    assert!(!snapshot.providers[0].available);
    assert_eq!(snapshot.stats.by_provider[0].failures, 1);
    assert_eq!(snapshot.stats.by_provider[1].successes, 1);
}

#[tokio::test]
async fn block_number_twice_makes_one_outbound_call() {
    let server = MockServer::start().await;
    mount_rpc(&server, "eth_blockNumber", rpc_result(json!("0x12a05f2"))).await;

    let balancer = Balancer::new(fast_config(vec![provider("node", &server, 3, 1)])).unwrap();
    let first = balancer
        .handle(&JsonRpcRequest::new("eth_blockNumber", json!([]), json!(1)), None)
        .await
        .unwrap();
    let second = balancer
        .handle(&JsonRpcRequest::new("eth_blockNumber", json!([]), json!(2)), None)
        .await
        .unwrap();

    assert_eq!(received(&server).await, 1);
    assert_eq!(second.outcome, DispatchOutcome::CacheHit);
    assert_eq!(second.response["id"], 2);

    let mut first_body = first.response.clone();
    let mut second_body = second.response.clone();
    first_body.as_object_mut().unwrap().remove("id");
    second_body.as_object_mut().unwrap().remove("id");
    assert_eq!(first_body, second_body);
}

#[tokio::test]
async fn different_params_are_not_shared() {
    let server = MockServer::start().await;
    mount_rpc(&server, "eth_getBalance", rpc_result(json!("0x0"))).await;

    let balancer = Balancer::new(fast_config(vec![provider("node", &server, 3, 1)])).unwrap();
    for address in ["0xaa", "0xbb"] {
        let request = JsonRpcRequest::new("eth_getBalance", json!([address, "latest"]), json!(1));
        balancer.handle(&request, None).await.unwrap();
    }
    assert_eq!(received(&server).await, 2);
    assert_eq!(balancer.cache().len(), 2);
}

#[tokio::test]
async fn rate_limited_everywhere_exhausts() {
    let server = MockServer::start().await;
    mount_status(&server, 429).await;

    let balancer = Balancer::new(fast_config(vec![provider("node", &server, 10, 1)])).unwrap();
    let request = JsonRpcRequest::new("eth_chainId", json!([]), json!(1));

    let error = balancer.handle(&request, None).await.unwrap_err();
    assert!(matches!(error, DispatchError::Exhausted { attempts: 3, .. }));
    assert_eq!(received(&server).await, 3);

    let stats = balancer.stats().snapshot(balancer.registry());
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.by_provider[0].failures, 3);
}

#[tokio::test]
async fn application_errors_pass_through() {
    let server = MockServer::start().await;
    mount_rpc(&server, "eth_sendRawTransaction", rpc_error(-32000, "nonce too low")).await;

    let balancer = Balancer::new(fast_config(vec![provider("node", &server, 3, 1)])).unwrap();
    let request = JsonRpcRequest::new("eth_sendRawTransaction", json!(["0xf86c"]), json!(3));

    let answer = balancer.handle(&request, None).await.unwrap();
    assert_eq!(answer.outcome, DispatchOutcome::RpcError);
    assert_eq!(answer.response["error"]["message"], "nonce too low");
    assert_eq!(received(&server).await, 1);
    assert_eq!(balancer.registry().get(0).unwrap().error_count(), 0);
}

#[tokio::test]
async fn health_probes_record_heights() {
    let ahead = MockServer::start().await;
    let behind = MockServer::start().await;
    mount_rpc(&ahead, "eth_blockNumber", rpc_result(json!("0x64"))).await;
    mount_rpc(&behind, "eth_blockNumber", rpc_result(json!("0x5f"))).await;

    let config = fast_config(vec![
        provider("ahead", &ahead, 3, 1),
        provider("behind", &behind, 3, 1),
    ]);
    let health = config.health_check();
    let registry = Arc::new(ProviderRegistry::new(config.providers).unwrap());

    let tracker = HealthTracker::new(
        Arc::clone(&registry),
        Arc::new(HttpTransport::new().unwrap()),
        health,
    );
    let round = tracker.check_all().await;

    assert_eq!(round.succeeded, 2);
    assert_eq!(round.max_height, Some(100));
    assert_eq!(round.lagging, vec!["behind".to_string()]);
    assert_eq!(registry.get(1).unwrap().block_height(), Some(95));
}
