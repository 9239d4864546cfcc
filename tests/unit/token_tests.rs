//! Token issuance, verification order and refresh rotation.
use crate::test_utils::{ctx, setup_auth, CLIENT_IP, PASSWORD, TECNICO_EMAIL};
use backend_lib::auth::{AuthError, AuthService, TokenType};
use chrono::Duration;
use taller_common::Role;
use uuid::Uuid;

#[tokio::test]
async fn test_access_token_round_trip() {
    let (auth, _clock, _directory) = setup_auth();
    let outcome = auth.login(TECNICO_EMAIL, PASSWORD, &ctx(CLIENT_IP)).await.unwrap();

    let verified = auth
        .tokens()
        .verify(&outcome.tokens.access, TokenType::Access)
        .unwrap();

    assert_eq!(verified.claims.id, outcome.claims.id);
    assert_eq!(verified.claims.email, TECNICO_EMAIL);
    assert_eq!(verified.claims.role, Role::Tecnico);
    assert!(verified.claims.active);
}

#[tokio::test]
async fn test_type_confusion_is_rejected() {
    let (auth, _clock, _directory) = setup_auth();
    let outcome = auth.login(TECNICO_EMAIL, PASSWORD, &ctx(CLIENT_IP)).await.unwrap();
    let tokens = auth.tokens();

    assert_eq!(
        tokens.verify(&outcome.tokens.refresh, TokenType::Access),
        Err(AuthError::TokenWrongType)
    );
    assert_eq!(
        tokens.verify(&outcome.tokens.access, TokenType::Refresh),
        Err(AuthError::TokenWrongType)
    );
    // and the service-level entry points agree
    assert_eq!(
        auth.verify_access(&outcome.tokens.refresh),
        Err(AuthError::TokenWrongType)
    );
    assert_eq!(
        auth.refresh(&outcome.tokens.access, &ctx(CLIENT_IP)).await.unwrap_err(),
        AuthError::TokenWrongType
    );
}

#[tokio::test]
async fn test_access_token_expires() {
    let (auth, clock, _directory) = setup_auth();
    let outcome = auth.login(TECNICO_EMAIL, PASSWORD, &ctx(CLIENT_IP)).await.unwrap();

    clock.advance(Duration::minutes(15));
    assert_eq!(
        auth.verify_access(&outcome.tokens.access),
        Err(AuthError::TokenExpired)
    );
}

#[tokio::test]
async fn test_used_refresh_token_is_revoked() {
    let (auth, clock, _directory) = setup_auth();
    let first = auth.login(TECNICO_EMAIL, PASSWORD, &ctx(CLIENT_IP)).await.unwrap();

    clock.advance(Duration::minutes(20));
    let second = auth.refresh(&first.tokens.refresh, &ctx(CLIENT_IP)).await.unwrap();
    assert_ne!(second.tokens.refresh, first.tokens.refresh);

    // Signature and expiry are still fine; it is revoked by use.
    assert_eq!(
        auth.refresh(&first.tokens.refresh, &ctx(CLIENT_IP)).await.unwrap_err(),
        AuthError::TokenRevoked
    );
    assert!(auth.verify_access(&second.tokens.access).is_ok());
}

#[tokio::test]
async fn test_refresh_updates_last_used() {
    let (auth, clock, _directory) = setup_auth();
    let first = auth.login(TECNICO_EMAIL, PASSWORD, &ctx(CLIENT_IP)).await.unwrap();
    let created = auth.sessions().find_by_id(first.tokens.session_id).unwrap();

    clock.advance(Duration::hours(2));
    auth.refresh(&first.tokens.refresh, &ctx(CLIENT_IP)).await.unwrap();

    let session = auth.sessions().find_by_id(first.tokens.session_id).unwrap();
    assert_eq!(session.last_used_at - created.last_used_at, Duration::hours(2));
    assert_ne!(session.refresh_token_hash, created.refresh_token_hash);
}

#[tokio::test]
async fn test_terminated_session_invalidates_access_token() {
    let (auth, _clock, _directory) = setup_auth();
    let outcome = auth.login(TECNICO_EMAIL, PASSWORD, &ctx(CLIENT_IP)).await.unwrap();

    assert!(auth.terminate_session(outcome.tokens.session_id));
    assert!(!auth.terminate_session(Uuid::new_v4()));
    assert_eq!(
        auth.verify_access(&outcome.tokens.access),
        Err(AuthError::TokenRevoked)
    );
}
