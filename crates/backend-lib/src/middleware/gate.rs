//! axum adapter for the request gate.
use super::client_ip::client_ip;
use crate::cookies::with_session_cookies;
use crate::error::AppError;
use crate::gate::{GateOutcome, GateRequest};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// Gate every request before it reaches a handler
pub async fn request_gate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookies = &state.settings.cookies;
    let jar = CookieJar::from_headers(request.headers());
    let gate_request = GateRequest {
        path: request.uri().path().to_string(),
        access_cookie: jar.get(&cookies.access_name).map(|c| c.value().to_string()),
        refresh_cookie: jar.get(&cookies.refresh_name).map(|c| c.value().to_string()),
        bearer: bearer_token(request.headers()),
        ip: client_ip(
            request.headers(),
            request.extensions(),
            state.settings.server.trust_proxy,
        ),
        user_agent: user_agent(request.headers()),
    };

    let decision = state.gate.evaluate(&gate_request).await;
    match decision.outcome {
        GateOutcome::Allow(user) => {
            if let Some(user) = user {
                request.extensions_mut().insert(user);
            }
            let response = next.run(request).await;
            match decision.refreshed {
                Some(tokens) => {
                    let jar = with_session_cookies(CookieJar::new(), cookies, &tokens, state.clock.now());
                    (jar, response).into_response()
                },
                None => response,
            }
        },
        GateOutcome::RedirectToLogin => Redirect::to(&state.settings.gate.login_path).into_response(),
        GateOutcome::Unauthorized => AppError::NotAuthenticated.into_response(),
        GateOutcome::Forbidden => AppError::Forbidden.into_response(),
    }
}
