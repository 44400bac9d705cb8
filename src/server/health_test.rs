//! Tests for health endpoints.

use super::*;
use crate::metrics::create_metrics;
use std::time::Duration;

/// Retries connection up to `max_retries` times with exponential backoff.
/// More reliable than a fixed sleep for test environments.
async fn wait_for_server(port: u16, max_retries: u32) -> reqwest::Client {
    let client = reqwest::Client::new();
    let mut delay = Duration::from_millis(10);

    for attempt in 1..=max_retries {
        match client
            .get(format!("http://127.0.0.1:{}/healthz", port))
            .timeout(Duration::from_millis(100))
            .send()
            .await
        {
            Ok(_) => return client,
            Err(_) if attempt < max_retries => {
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_millis(200));
            }
            Err(e) => panic!("Server not ready after {} attempts: {}", max_retries, e),
        }
    }
    client
}

#[tokio::test]
async fn test_healthz_returns_200() {
    let readiness = ReadinessState::new();
    let metrics = create_metrics().expect("create metrics");
    let port = 18080;

    let server_readiness = readiness.clone();
    let server_metrics = metrics.clone();
    let server_handle =
        tokio::spawn(async move { run_health_server(port, server_readiness, server_metrics).await });

    let client = wait_for_server(port, 10).await;

    let response = client
        .get(format!("http://127.0.0.1:{}/healthz", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("failed to connect to health server");

    assert_eq!(response.status(), 200, "liveness probe should return 200");

    server_handle.abort();
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let readiness = ReadinessState::new();
    let metrics = create_metrics().expect("create metrics");
    assert!(!readiness.is_ready(), "should start as not ready");

    let port = 18081;

    let server_readiness = readiness.clone();
    let server_metrics = metrics.clone();
    let server_handle =
        tokio::spawn(async move { run_health_server(port, server_readiness, server_metrics).await });

    let client = wait_for_server(port, 10).await;

    let response = client
        .get(format!("http://127.0.0.1:{}/readyz", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("failed to connect to health server");

    assert_eq!(response.status(), 503, "readiness probe should return 503 when not ready");

    server_handle.abort();
}

#[tokio::test]
async fn test_readyz_returns_200_when_ready() {
    let readiness = ReadinessState::new();
    let metrics = create_metrics().expect("create metrics");
    readiness.set_ready();
    assert!(readiness.is_ready(), "should be ready after set_ready()");

    let port = 18082;

    let server_readiness = readiness.clone();
    let server_metrics = metrics.clone();
    let server_handle =
        tokio::spawn(async move { run_health_server(port, server_readiness, server_metrics).await });

    let client = wait_for_server(port, 10).await;

    let response = client
        .get(format!("http://127.0.0.1:{}/readyz", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("failed to connect to health server");

    assert_eq!(response.status(), 200, "readiness probe should return 200 when ready");

    server_handle.abort();
}

#[test]
fn test_readiness_state_transitions() {
    let state = ReadinessState::new();
    assert!(!state.is_ready());
    state.set_ready();
    assert!(state.is_ready());

    let cloned = state.clone();
    assert!(cloned.is_ready());
}

#[tokio::test]
async fn test_metrics_returns_prometheus_format() {
    let readiness = ReadinessState::new();
    let metrics = create_metrics().expect("create metrics");
    let port = 18083;

    metrics.record_task_run("reconcile_cronjobs", true);

    let server_readiness = readiness.clone();
    let server_metrics = metrics.clone();
    let server_handle =
        tokio::spawn(async move { run_health_server(port, server_readiness, server_metrics).await });

    let client = wait_for_server(port, 10).await;

    let response = client
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("failed to connect to metrics endpoint");

    assert_eq!(response.status(), 200, "metrics should return 200");

    let content_type = response
        .headers()
        .get("content-type")
        .expect("should have content-type")
        .to_str()
        .expect("content-type should be string");
    assert!(content_type.contains("text/plain"), "should be text/plain for Prometheus");

    let body = response.text().await.expect("should have body");
    assert!(body.contains("nsreaper_task_runs_total"), "should contain task run counter");

    server_handle.abort();
}
