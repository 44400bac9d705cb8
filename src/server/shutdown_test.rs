use super::*;
use std::time::Duration;

#[tokio::test]
async fn signal_fires_all_waiters() {
    let (controller, signal) = shutdown_channel();
    let signal_a = signal.clone();
    let signal_b = signal.clone();

    let handle_a = tokio::spawn(async move {
        signal_a.wait().await;
    });
    let handle_b = tokio::spawn(async move {
        signal_b.wait().await;
    });

    assert!(!signal.is_shutting_down());
    controller.shutdown();

    tokio::time::timeout(Duration::from_secs(1), handle_a).await.unwrap().unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle_b).await.unwrap().unwrap();
    assert!(signal.is_shutting_down());
}

#[tokio::test]
async fn waiting_without_a_shutdown_never_resolves() {
    let (_controller, signal) = shutdown_channel();
    let result = tokio::time::timeout(Duration::from_millis(50), signal.wait()).await;
    assert!(result.is_err(), "wait() should not resolve before shutdown");
}
