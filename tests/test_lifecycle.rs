use std::time::Duration;

use basic_auth_proxy::server::{Lifecycle, LifecycleState};

#[test]
fn test_lifecycle_starts_running() {
    assert_eq!(Lifecycle::new().state(), LifecycleState::Running);
}

#[test]
fn test_lifecycle_shutdown_is_idempotent() {
    let lifecycle = Lifecycle::new();

    assert!(lifecycle.request_shutdown());
    assert!(!lifecycle.request_shutdown());
    assert_eq!(lifecycle.state(), LifecycleState::ShuttingDown);

    lifecycle.mark_stopped();
    assert!(!lifecycle.request_shutdown());
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_lifecycle_wakes_waiters_from_clones() {
    let lifecycle = Lifecycle::new();
    let waiter = lifecycle.clone();

    let wait = tokio::spawn(async move { waiter.shutdown_requested().await });
    tokio::task::yield_now().await;
    assert!(!wait.is_finished());

    lifecycle.request_shutdown();
    tokio::time::timeout(Duration::from_secs(1), wait)
        .await
        .expect("waiter not woken")
        .unwrap();
}

#[tokio::test]
async fn test_lifecycle_wait_returns_immediately_after_shutdown() {
    let lifecycle = Lifecycle::new();
    lifecycle.request_shutdown();

    tokio::time::timeout(Duration::from_millis(100), lifecycle.shutdown_requested())
        .await
        .expect("already shutting down");
}
