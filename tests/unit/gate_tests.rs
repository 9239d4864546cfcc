//! Request gate decisions.
use crate::test_utils::{
    ctx, setup_test_env, TestEnv, ADMIN_EMAIL, CLIENT_IP, PASSWORD, TECNICO_EMAIL,
};
use backend_lib::auth::TokenPair;
use backend_lib::directory::UserDirectory;
use backend_lib::gate::{GateOutcome, GateRequest};
use chrono::Duration;
use taller_common::Role;

fn request(path: &str) -> GateRequest {
    GateRequest {
        path: path.to_string(),
        access_cookie: None,
        refresh_cookie: None,
        bearer: None,
        ip: CLIENT_IP.parse().unwrap(),
        user_agent: None,
    }
}

fn with_cookie(path: &str, tokens: &TokenPair) -> GateRequest {
    let mut req = request(path);
    req.access_cookie = Some(tokens.access.clone());
    req
}

async fn login(env: &TestEnv, email: &str) -> TokenPair {
    env.state
        .auth
        .login(email, PASSWORD, &ctx(CLIENT_IP))
        .await
        .unwrap()
        .tokens
}

#[tokio::test]
async fn test_no_token_redirects_pages_and_rejects_api() {
    let env = setup_test_env().await;

    let page = env.state.gate.evaluate(&request("/dashboard")).await;
    assert_eq!(page.outcome, GateOutcome::RedirectToLogin);

    let api = env.state.gate.evaluate(&request("/api/orders")).await;
    assert_eq!(api.outcome, GateOutcome::Unauthorized);
}

#[tokio::test]
async fn test_admin_route_role_check() {
    let env = setup_test_env().await;
    let tecnico = login(&env, TECNICO_EMAIL).await;
    let admin = login(&env, ADMIN_EMAIL).await;

    let denied = env
        .state
        .gate
        .evaluate(&with_cookie("/api/admin/sessions", &tecnico))
        .await;
    assert_eq!(denied.outcome, GateOutcome::Forbidden);

    let allowed = env
        .state
        .gate
        .evaluate(&with_cookie("/api/admin/sessions", &admin))
        .await;
    match allowed.outcome {
        GateOutcome::Allow(Some(user)) => assert_eq!(user.claims.role, Role::Admin),
        other => panic!("expected allow, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_tokens_look_unauthenticated() {
    let env = setup_test_env().await;
    let tokens = login(&env, TECNICO_EMAIL).await;

    // wrong type
    let mut req = request("/api/me");
    req.access_cookie = Some(tokens.refresh.clone());
    assert_eq!(env.state.gate.evaluate(&req).await.outcome, GateOutcome::Unauthorized);

    // malformed
    req.access_cookie = Some("not.a.token".to_string());
    assert_eq!(env.state.gate.evaluate(&req).await.outcome, GateOutcome::Unauthorized);

    // expired
    env.clock.advance(Duration::minutes(16));
    let expired = env.state.gate.evaluate(&with_cookie("/orders", &tokens)).await;
    assert_eq!(expired.outcome, GateOutcome::RedirectToLogin);
}

#[tokio::test]
async fn test_privileged_routes_recheck_directory() {
    let env = setup_test_env().await;
    let admin = login(&env, ADMIN_EMAIL).await;

    let mut demoted = env.directory.find_by_id("u-admin").await.unwrap().unwrap();
    demoted.role = Role::Tecnico;
    env.directory.upsert(demoted.clone()).await.unwrap();

    // The token still says admin, the directory no longer does.
    let decision = env.state.gate.evaluate(&with_cookie("/admin", &admin)).await;
    assert_eq!(decision.outcome, GateOutcome::Forbidden);

    demoted.active = false;
    env.directory.upsert(demoted).await.unwrap();
    let decision = env.state.gate.evaluate(&with_cookie("/admin", &admin)).await;
    assert_eq!(decision.outcome, GateOutcome::RedirectToLogin);

    // Ordinary protected routes trust the token until it expires.
    let decision = env.state.gate.evaluate(&with_cookie("/api/me", &admin)).await;
    assert!(matches!(decision.outcome, GateOutcome::Allow(Some(_))));
}

#[tokio::test]
async fn test_public_routes_skip_token_work() {
    let env = setup_test_env().await;
    let mut req = request("/api/health");
    req.access_cookie = Some("garbage".to_string());

    assert_eq!(env.state.gate.evaluate(&req).await.outcome, GateOutcome::Allow(None));
}
