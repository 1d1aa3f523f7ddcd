//! Admission control over real connections.

use std::time::Instant;

use futures_util::future::join_all;
use gatekeeper::config::GatekeeperConfig;
use gatekeeper::lifecycle::ShutdownCause;
use reqwest::StatusCode;
use serde_json::Value;

mod common;

#[tokio::test]
async fn test_burst_then_too_many_requests() {
    let server = common::start_server(GatekeeperConfig::default()).await;
    let client = common::client();

    // Default limits: 2 rps, burst 4. Every connection comes from 127.0.0.1.
    for _ in 0..4 {
        let res = client.get(server.url("/v1/healthcheck")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client.get(server.url("/v1/healthcheck")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "rate limit exceeded");

    assert_eq!(server.registry.len(), 1);

    server.trigger.fire(ShutdownCause::Requested);
    server.outcome.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_concurrent_clients_share_one_budget() {
    let mut config = GatekeeperConfig::default();
    config.rate_limit.requests_per_second = 0.01;
    config.rate_limit.burst_size = 5;
    let server = common::start_server(config).await;
    let client = common::client();

    let start = Instant::now();
    let responses = join_all((0..120).map(|_| {
        let client = client.clone();
        let url = server.url("/v1/healthcheck");
        async move { client.get(url).send().await.unwrap().status() }
    }))
    .await;
    let elapsed = start.elapsed().as_secs_f64();

    let allowed = responses.iter().filter(|s| **s == StatusCode::OK).count();
    let denied = responses
        .iter()
        .filter(|s| **s == StatusCode::TOO_MANY_REQUESTS)
        .count();

    assert_eq!(allowed, 5 + (elapsed * 0.01).floor() as usize);
    assert_eq!(allowed + denied, 120);

    server.trigger.fire(ShutdownCause::Requested);
    server.outcome.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_disabled_limiter_never_rejects() {
    let mut config = GatekeeperConfig::default();
    config.rate_limit.enabled = false;
    let server = common::start_server(config).await;
    let client = common::client();

    for _ in 0..20 {
        let res = client.get(server.url("/v1/healthcheck")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    assert!(server.registry.is_empty());

    server.trigger.fire(ShutdownCause::Requested);
    server.outcome.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_rejections_cover_unknown_routes() {
    let mut config = GatekeeperConfig::default();
    config.rate_limit.burst_size = 1;
    let server = common::start_server(config).await;
    let client = common::client();

    let res = client.get(server.url("/missing")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.get(server.url("/missing")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    server.trigger.fire(ShutdownCause::Requested);
    server.outcome.await.unwrap().unwrap();
}
