//! Per-account lockout.
use crate::test_utils::{ctx, setup_auth, PASSWORD, TECNICO_EMAIL};
use backend_lib::auth::{AuthError, AuthService, LockoutTracker};
use backend_lib::clock::{Clock, ManualClock};
use chrono::Duration;
use std::sync::Arc;

fn tracker() -> (LockoutTracker, ManualClock) {
    let clock = ManualClock::starting_now();
    let tracker = LockoutTracker::new(Arc::new(clock.clone()), 5, Duration::minutes(30));
    (tracker, clock)
}

#[test]
fn test_fifth_failure_locks_for_thirty_minutes() {
    let (tracker, clock) = tracker();
    let t0 = clock.now();

    for _ in 0..4 {
        assert!(!tracker.increment("a@x.com").locked);
    }
    let fifth = tracker.increment("a@x.com");
    assert!(fifth.locked);
    assert_eq!(fifth.locked_until, Some(t0 + Duration::minutes(30)));

    clock.advance(Duration::minutes(29));
    let status = tracker.check("a@x.com");
    assert!(status.locked);

    clock.advance(Duration::minutes(2));
    let status = tracker.check("a@x.com");
    assert!(!status.locked);
    assert_eq!(status.attempts, 0);
}

#[test]
fn test_knocking_does_not_extend_lock() {
    let (tracker, clock) = tracker();
    for _ in 0..5 {
        tracker.increment("a@x.com");
    }
    let until = tracker.check("a@x.com").locked_until;

    clock.advance(Duration::minutes(10));
    let knock = tracker.increment("a@x.com");

    assert_eq!(knock.attempts, 6);
    assert_eq!(knock.locked_until, until);
}

#[test]
fn test_reset_is_a_full_reset() {
    let (tracker, _clock) = tracker();
    for _ in 0..5 {
        tracker.increment("a@x.com");
    }
    tracker.reset("A@X.com");

    let status = tracker.check("a@x.com");
    assert!(!status.locked);
    assert_eq!(status.attempts, 0);
}

#[tokio::test]
async fn test_locked_account_refuses_even_the_right_password() {
    let (auth, clock, _directory) = setup_auth();
    // Different IPs so the per-IP limiter stays out of the way.
    for n in 0..5 {
        let _ = auth
            .login(TECNICO_EMAIL, "wrong", &ctx(&format!("198.51.100.{n}")))
            .await;
    }

    let result = auth.login(TECNICO_EMAIL, PASSWORD, &ctx("198.51.100.50")).await;
    assert!(matches!(result, Err(AuthError::AccountLocked { .. })));

    clock.advance(Duration::minutes(31));
    assert!(auth.login(TECNICO_EMAIL, PASSWORD, &ctx("198.51.100.51")).await.is_ok());
    assert_eq!(auth.lockout().check(TECNICO_EMAIL).attempts, 0);
}
