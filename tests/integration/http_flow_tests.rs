//! Full HTTP flows through the router: cookies, error bodies, gate redirects, admin.
use crate::test_utils::{
    body_json, cookie_value, login_request, send, set_cookies, setup_test_env, TestEnv,
    ADMIN_EMAIL, PASSWORD, TECNICO_EMAIL,
};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use std::collections::HashMap;

const ACCESS: &str = "taller_access";
const REFRESH: &str = "taller_refresh";

fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri).header("x-real-ip", "192.0.2.200")
}

fn with_cookies(builder: axum::http::request::Builder, access: &str, refresh: &str) -> Request<Body> {
    builder
        .header(header::COOKIE, format!("{ACCESS}={access}; {REFRESH}={refresh}"))
        .body(Body::empty())
        .unwrap()
}

/// Log in and return (access, refresh) cookie values
async fn login(env: &TestEnv, email: &str, ip: &str) -> (String, String) {
    let response = send(&env.app, login_request(email, PASSWORD, ip)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    (cookie_value(&cookies[ACCESS]), cookie_value(&cookies[REFRESH]))
}

#[tokio::test]
async fn test_login_sets_hardened_cookies() {
    let env = setup_test_env().await;
    let response = send(&env.app, login_request(TECNICO_EMAIL, PASSWORD, "192.0.2.1")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies: HashMap<String, String> = set_cookies(&response);
    for name in [ACCESS, REFRESH] {
        let cookie = &cookies[name];
        assert!(cookie.contains("HttpOnly"), "{cookie}");
        assert!(cookie.contains("SameSite=Strict"), "{cookie}");
        assert!(cookie.contains("Path=/"), "{cookie}");
        assert!(cookie.contains("Secure"), "{cookie}");
        assert!(!cookie_value(cookie).is_empty());
    }

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], TECNICO_EMAIL);
    assert!(body["user"].get("credential").is_none());
}

#[tokio::test]
async fn test_wrong_password_and_unknown_account_look_identical() {
    let env = setup_test_env().await;

    let wrong = send(&env.app, login_request(TECNICO_EMAIL, "nope", "192.0.2.2")).await;
    let unknown = send(&env.app, login_request("ghost@x.com", "nope", "192.0.2.3")).await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&wrong).is_empty());
    assert_eq!(body_json(wrong).await, body_json(unknown).await);
}

#[tokio::test]
async fn test_lockout_then_rate_limit() {
    let env = setup_test_env().await;
    let ip = "192.0.2.4";

    for _ in 0..4 {
        let response = send(&env.app, login_request(TECNICO_EMAIL, "nope", ip)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let fifth = send(&env.app, login_request(TECNICO_EMAIL, "nope", ip)).await;
    assert_eq!(fifth.status(), StatusCode::LOCKED);
    let body = body_json(fifth).await;
    assert_eq!(body["locked"], true);
    assert_eq!(body["retry_after_minutes"], 30);

    let sixth = send(&env.app, login_request(TECNICO_EMAIL, PASSWORD, ip)).await;
    assert_eq!(sixth.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(sixth).await;
    assert_eq!(body["remaining_attempts"], 0);

    // Another address is not throttled but the account is still locked.
    let elsewhere = send(&env.app, login_request(TECNICO_EMAIL, PASSWORD, "192.0.2.5")).await;
    assert_eq!(elsewhere.status(), StatusCode::LOCKED);
}

#[tokio::test]
async fn test_me_accepts_cookie_or_bearer() {
    let env = setup_test_env().await;
    let (access, _) = login(&env, TECNICO_EMAIL, "192.0.2.6").await;

    let by_cookie = send(
        &env.app,
        request(Method::GET, "/api/me")
            .header(header::COOKIE, format!("{ACCESS}={access}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(by_cookie.status(), StatusCode::OK);
    assert_eq!(body_json(by_cookie).await["email"], TECNICO_EMAIL);

    let by_bearer = send(
        &env.app,
        request(Method::GET, "/api/me")
            .header(header::AUTHORIZATION, format!("Bearer {access}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(by_bearer.status(), StatusCode::OK);

    let anonymous = send(
        &env.app,
        request(Method::GET, "/api/me").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_pages_redirect_to_login() {
    let env = setup_test_env().await;
    let response = send(
        &env.app,
        request(Method::GET, "/dashboard").body(Body::empty()).unwrap(),
    )
    .await;
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn test_health_is_public() {
    let env = setup_test_env().await;
    let response = send(
        &env.app,
        request(Method::GET, "/api/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_session_management() {
    let env = setup_test_env().await;
    let (tec_access, tec_refresh) = login(&env, TECNICO_EMAIL, "192.0.2.7").await;
    let (admin_access, admin_refresh) = login(&env, ADMIN_EMAIL, "192.0.2.8").await;

    let forbidden = send(
        &env.app,
        with_cookies(
            request(Method::GET, "/api/admin/sessions?user_id=u-tecnico"),
            &tec_access,
            &tec_refresh,
        ),
    )
    .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let listed = send(
        &env.app,
        with_cookies(
            request(Method::GET, "/api/admin/sessions?user_id=u-tecnico"),
            &admin_access,
            &admin_refresh,
        ),
    )
    .await;
    assert_eq!(listed.status(), StatusCode::OK);
    let sessions = body_json(listed).await;
    let sessions = sessions.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["issuingIp"], "192.0.2.7");
    assert_eq!(sessions[0]["stale"], false);
    let session_id = sessions[0]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/admin/sessions/{session_id}");
    let deleted = send(
        &env.app,
        with_cookies(request(Method::DELETE, &uri), &admin_access, &admin_refresh),
    )
    .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let again = send(
        &env.app,
        with_cookies(request(Method::DELETE, &uri), &admin_access, &admin_refresh),
    )
    .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);

    // The terminated session's access token stops working at once.
    let me = send(
        &env.app,
        with_cookies(request(Method::GET, "/api/me"), &tec_access, &tec_refresh),
    )
    .await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    let (_, _) = login(&env, TECNICO_EMAIL, "192.0.2.9").await;
    let bulk = send(
        &env.app,
        with_cookies(
            request(Method::DELETE, "/api/admin/users/u-tecnico/sessions"),
            &admin_access,
            &admin_refresh,
        ),
    )
    .await;
    assert_eq!(bulk.status(), StatusCode::OK);
    assert_eq!(body_json(bulk).await["terminated"], 1);
}

#[tokio::test]
async fn test_refresh_rotates_and_rejects_replay() {
    let env = setup_test_env().await;
    let (access, refresh) = login(&env, TECNICO_EMAIL, "192.0.2.10").await;

    let rotated = send(
        &env.app,
        with_cookies(request(Method::POST, "/api/auth/refresh"), &access, &refresh),
    )
    .await;
    assert_eq!(rotated.status(), StatusCode::OK);
    let cookies = set_cookies(&rotated);
    let new_refresh = cookie_value(&cookies[REFRESH]);
    assert_ne!(new_refresh, refresh);
    assert!(!cookie_value(&cookies[ACCESS]).is_empty());

    let replay = send(
        &env.app,
        with_cookies(request(Method::POST, "/api/auth/refresh"), &access, &refresh),
    )
    .await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    // Rejected refresh clears both cookies.
    let cleared = set_cookies(&replay);
    assert_eq!(cookie_value(&cleared[ACCESS]), "");
    assert_eq!(cookie_value(&cleared[REFRESH]), "");

    let no_cookie = send(
        &env.app,
        request(Method::POST, "/api/auth/refresh").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(no_cookie.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_cookies_and_ends_session() {
    let env = setup_test_env().await;
    let (access, refresh) = login(&env, TECNICO_EMAIL, "192.0.2.11").await;

    let response = send(
        &env.app,
        with_cookies(request(Method::POST, "/api/auth/logout"), &access, &refresh),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = set_cookies(&response);
    assert_eq!(cookie_value(&cleared[ACCESS]), "");
    assert_eq!(cookie_value(&cleared[REFRESH]), "");

    let me = send(
        &env.app,
        with_cookies(request(Method::GET, "/api/me"), &access, &refresh),
    )
    .await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    let reuse = send(
        &env.app,
        with_cookies(request(Method::POST, "/api/auth/refresh"), &access, &refresh),
    )
    .await;
    assert_eq!(reuse.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_login_body_uses_error_envelope() {
    let env = setup_test_env().await;
    for (content_type, body) in [
        ("application/json", "{ not json"),
        ("application/json", r#"{"email": "a@x.com"}"#),
        ("text/plain", r#"{"email": "a@x.com", "password": "x"}"#),
    ] {
        let response = send(
            &env.app,
            request(Method::POST, "/api/auth/login")
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VAL_001");
    }
}
