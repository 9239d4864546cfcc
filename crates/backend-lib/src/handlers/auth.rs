// ============================
// crates/backend-lib/src/handlers/auth.rs
// ============================
//! Login, refresh and logout endpoints.
use crate::auth::{AuthError, LoginContext};
use crate::cookies::{clear_session_cookies, with_session_cookies};
use crate::error::AppError;
use crate::middleware::gate::{bearer_token, user_agent};
use crate::middleware::ClientIp;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use taller_common::{LoginRequest, LoginResponse};
use tracing::debug;
use zeroize::Zeroize;

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let Json(mut body) = body.map_err(|rejection| {
        debug!(error = %rejection, "malformed login body");
        AppError::InvalidInput("malformed login body".into())
    })?;
    if body.email.trim().is_empty() || body.password.is_empty() {
        body.password.zeroize();
        return Err(AppError::InvalidInput("email and password are required".into()));
    }

    let ctx = LoginContext {
        ip,
        user_agent: user_agent(&headers),
    };
    let result = state.auth.login(&body.email, &body.password, &ctx).await;
    body.password.zeroize();

    let outcome = result.map_err(|err| AppError::from_auth(err, state.clock.now()))?;
    let jar = with_session_cookies(jar, &state.settings.cookies, &outcome.tokens, state.clock.now());
    Ok((
        jar,
        Json(LoginResponse {
            success: true,
            user: outcome.claims,
        }),
    ))
}

/// `POST /api/auth/refresh`. Only the refresh cookie is accepted.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let cookies = &state.settings.cookies;
    let Some(token) = jar.get(&cookies.refresh_name).map(|c| c.value().to_owned()) else {
        return (clear_session_cookies(jar, cookies), AppError::NotAuthenticated).into_response();
    };

    let ctx = LoginContext {
        ip,
        user_agent: user_agent(&headers),
    };
    match state.auth.refresh(&token, &ctx).await {
        Ok(outcome) => {
            let jar = with_session_cookies(jar, cookies, &outcome.tokens, state.clock.now());
            let body = Json(LoginResponse {
                success: true,
                user: outcome.claims,
            });
            (jar, body).into_response()
        },
        // A transient directory failure should not throw the session away.
        Err(AuthError::DirectoryUnavailable) => AppError::NotAuthenticated.into_response(),
        Err(AuthError::Internal(msg)) => AppError::Internal(msg).into_response(),
        Err(err) => {
            debug!(reason = err.reason(), "refresh rejected");
            (clear_session_cookies(jar, cookies), AppError::NotAuthenticated).into_response()
        },
    }
}

/// `POST /api/auth/logout`. Always succeeds.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, StatusCode) {
    let cookies = &state.settings.cookies;
    let access = jar
        .get(&cookies.access_name)
        .map(|c| c.value().to_owned())
        .or_else(|| bearer_token(&headers));
    let refresh = jar.get(&cookies.refresh_name).map(|c| c.value().to_owned());

    state.auth.logout(access.as_deref(), refresh.as_deref());
    (clear_session_cookies(jar, cookies), StatusCode::NO_CONTENT)
}
