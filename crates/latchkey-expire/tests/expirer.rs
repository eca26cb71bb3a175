//! Integration tests for the renewable expiration registry.
//!
//! Uses `tokio::time::pause()` (via `start_paused`) so the clock only moves
//! when every task is idle. Multi-second countdowns resolve instantly and
//! the observed elapsed time is deterministic.

use std::time::Duration;

use latchkey_expire::{ExpireError, Expirer};
use tokio::time::{Instant, sleep, timeout};

// =========================================================================
// Helpers
// =========================================================================

fn five_secs() -> Expirer {
    Expirer::with_secs(5).unwrap()
}

/// Asserts `elapsed` is `expected`, allowing the timer wheel's 1 ms rounding.
fn assert_about(elapsed: Duration, expected: Duration) {
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(5),
        "expected ~{expected:?}, got {elapsed:?}"
    );
}

// =========================================================================
// Construction
// =========================================================================

#[test]
fn test_new_rejects_zero_duration() {
    assert_eq!(
        Expirer::with_secs(0).unwrap_err(),
        ExpireError::ZeroDuration
    );
}

#[test]
fn test_new_accepts_sub_second_duration() {
    let expirer = Expirer::new(Duration::from_millis(250)).unwrap();
    assert_eq!(expirer.duration(), Duration::from_millis(250));
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_next_expired_fires_after_duration() {
    let mut expirer = five_secs();
    let start = Instant::now();
    expirer.touch("session-a");

    let key = expirer.next_expired().await;

    assert_eq!(key, "session-a");
    assert_about(start.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_next_expired_forgets_key_after_firing() {
    let mut expirer = five_secs();
    expirer.touch("session-a");

    expirer.next_expired().await;

    assert!(!expirer.contains("session-a"));
    assert!(expirer.is_empty());
    // Nothing left: a second wait must pend.
    let second = timeout(Duration::from_secs(60), expirer.next_expired()).await;
    assert!(second.is_err(), "key must fire only once per touch");
}

#[tokio::test(start_paused = true)]
async fn test_next_expired_empty_registry_pends_forever() {
    let mut expirer = five_secs();

    let result = timeout(Duration::from_secs(3600), expirer.next_expired()).await;

    assert!(result.is_err(), "empty registry should pend");
}

#[tokio::test(start_paused = true)]
async fn test_next_expired_orders_by_deadline() {
    let mut expirer = five_secs();
    expirer.touch("first");
    sleep(Duration::from_secs(1)).await;
    expirer.touch("second");

    assert_eq!(expirer.next_expired().await, "first");
    assert_eq!(expirer.next_expired().await, "second");
}

#[tokio::test(start_paused = true)]
async fn test_next_expired_equal_deadlines_fire_in_touch_order() {
    let mut expirer = five_secs();
    for key in ["a", "b", "c"] {
        expirer.touch(key);
    }

    let fired = vec![
        expirer.next_expired().await,
        expirer.next_expired().await,
        expirer.next_expired().await,
    ];

    assert_eq!(fired, vec!["a", "b", "c"]);
}

// =========================================================================
// Renewal
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_touch_restarts_countdown() {
    let mut expirer = five_secs();
    let start = Instant::now();
    expirer.touch("session-a");

    sleep(Duration::from_secs(3)).await;
    expirer.touch("session-a");

    let key = expirer.next_expired().await;
    assert_eq!(key, "session-a");
    assert_about(start.elapsed(), Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_touch_does_not_stack() {
    let mut expirer = five_secs();
    for _ in 0..10 {
        expirer.touch("session-a");
    }
    assert_eq!(expirer.len(), 1);

    expirer.next_expired().await;

    let again = timeout(Duration::from_secs(60), expirer.next_expired()).await;
    assert!(again.is_err(), "ten touches still fire only once");
}

#[tokio::test(start_paused = true)]
async fn test_touch_after_firing_starts_new_countdown() {
    let mut expirer = five_secs();
    expirer.touch("session-a");
    expirer.next_expired().await;

    let restart = Instant::now();
    expirer.touch("session-a");
    let key = expirer.next_expired().await;

    assert_eq!(key, "session-a");
    assert_about(restart.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_touch_between_cancelled_waits_is_never_premature() {
    // Mirrors an actor loop: the wait is dropped by a competing branch,
    // the key is touched, and the next wait must honor the new deadline.
    let mut expirer = five_secs();
    let start = Instant::now();
    expirer.touch("session-a");

    let first = timeout(Duration::from_secs(4), expirer.next_expired()).await;
    assert!(first.is_err());
    expirer.touch("session-a");

    expirer.next_expired().await;
    assert_about(start.elapsed(), Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_reflects_latest_touch() {
    let mut expirer = five_secs();
    expirer.touch("session-a");
    let first = expirer.deadline("session-a").unwrap();

    sleep(Duration::from_secs(2)).await;
    expirer.touch("session-a");
    let second = expirer.deadline("session-a").unwrap();

    assert_about(second - first, Duration::from_secs(2));
    assert!(expirer.deadline("unknown").is_none());
}

// =========================================================================
// Removal and independence
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_remove_prevents_firing() {
    let mut expirer = five_secs();
    expirer.touch("gone");
    expirer.touch("kept");

    assert!(expirer.remove("gone"));

    assert_eq!(expirer.next_expired().await, "kept");
    let rest = timeout(Duration::from_secs(60), expirer.next_expired()).await;
    assert!(rest.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_clear_drops_every_countdown() {
    let mut expirer = five_secs();
    expirer.touch("a");
    expirer.touch("b");

    expirer.clear();

    assert!(expirer.is_empty());
    let result = timeout(Duration::from_secs(60), expirer.next_expired()).await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_registries_are_independent() {
    let mut short = Expirer::with_secs(2).unwrap();
    let mut long = Expirer::with_secs(6).unwrap();
    let start = Instant::now();
    short.touch("shared-key");
    long.touch("shared-key");

    short.next_expired().await;
    assert_about(start.elapsed(), Duration::from_secs(2));
    assert!(long.contains("shared-key"), "firing in one registry leaves the other alone");

    short.touch("shared-key");
    long.next_expired().await;
    assert_about(start.elapsed(), Duration::from_secs(6));
}
