// ==============================
// tests/unit/rate_limit_tests.rs
// ==============================
//! Per-IP login rate limiting, on its own and inside the login flow.
use crate::test_utils::{ctx, setup_auth, CLIENT_IP, TECNICO_EMAIL};
use backend_lib::auth::{AuthError, AuthService, RateLimiter};
use backend_lib::clock::ManualClock;
use chrono::Duration;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

fn limiter() -> (RateLimiter, ManualClock) {
    let clock = ManualClock::starting_now();
    let limiter = RateLimiter::new(Arc::new(clock.clone()), 5, Duration::minutes(15));
    (limiter, clock)
}

#[test]
fn test_sixth_attempt_in_window_is_denied() {
    let (limiter, _clock) = limiter();
    let ip = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 5));

    for expected_remaining in [4, 3, 2, 1, 0] {
        let decision = limiter.check(ip);
        assert!(decision.allowed);
        assert_eq!(decision.remaining_attempts, expected_remaining);
    }

    let sixth = limiter.check(ip);
    assert!(!sixth.allowed);
    assert_eq!(sixth.remaining_attempts, 0);
}

#[test]
fn test_window_rollover_starts_fresh() {
    let (limiter, clock) = limiter();
    let ip = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 5));
    for _ in 0..6 {
        limiter.check(ip);
    }

    clock.advance(Duration::minutes(15) + Duration::seconds(1));
    let decision = limiter.check(ip);
    assert!(decision.allowed);
    assert_eq!(decision.remaining_attempts, 4);
}

#[test]
fn test_ips_are_independent() {
    let (limiter, _clock) = limiter();
    let noisy = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1));
    let quiet = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 2));
    for _ in 0..6 {
        limiter.check(noisy);
    }

    assert!(!limiter.check(noisy).allowed);
    assert!(limiter.check(quiet).allowed);
}

/// Five failed logins at t=0..4min, the sixth at t=5min is rate limited,
/// and at t=16min a fresh window admits the attempt with four remaining.
#[tokio::test]
async fn test_login_rate_limit_scenario() {
    let (auth, clock, _directory) = setup_auth();
    let ctx = ctx(CLIENT_IP);

    for minute in 0..5 {
        if minute > 0 {
            clock.advance(Duration::minutes(1));
        }
        let result = auth.login(TECNICO_EMAIL, "wrong", &ctx).await;
        assert!(matches!(
            result,
            Err(AuthError::InvalidCredentials) | Err(AuthError::AccountLocked { .. })
        ));
    }

    clock.advance(Duration::minutes(1));
    let sixth = auth.login(TECNICO_EMAIL, "wrong", &ctx).await;
    assert!(matches!(
        sixth,
        Err(AuthError::RateLimited {
            remaining_attempts: 0,
            ..
        })
    ));

    clock.advance(Duration::minutes(11));
    let decision = auth.rate_limiter().check(ctx.ip);
    assert!(decision.allowed);
    assert_eq!(decision.remaining_attempts, 4);
}

#[tokio::test]
async fn test_unknown_accounts_are_throttled_too() {
    let (auth, _clock, _directory) = setup_auth();
    let ctx = ctx("198.51.100.20");

    for n in 0..5 {
        let email = format!("probe{n}@x.com");
        assert_eq!(
            auth.login(&email, "guess", &ctx).await.unwrap_err(),
            AuthError::InvalidCredentials
        );
    }
    assert!(matches!(
        auth.login("probe5@x.com", "guess", &ctx).await,
        Err(AuthError::RateLimited { .. })
    ));
}
