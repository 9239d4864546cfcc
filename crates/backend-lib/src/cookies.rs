//! Session cookies.
//!
//! Both cookies are HTTP-only, same-site strict and scoped to `/`. Names and the
//! `Secure` flag come from configuration.
use crate::auth::TokenPair;
use crate::config::CookieSettings;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};

fn session_cookie(name: String, value: String, secure: bool, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(cookie::time::Duration::seconds(max_age_secs.max(0)))
        .build()
}

/// Add access and refresh cookies for `tokens`
pub fn with_session_cookies(
    jar: CookieJar,
    settings: &CookieSettings,
    tokens: &TokenPair,
    now: DateTime<Utc>,
) -> CookieJar {
    jar.add(session_cookie(
        settings.access_name.clone(),
        tokens.access.clone(),
        settings.secure,
        (tokens.access_expires_at - now).num_seconds(),
    ))
    .add(session_cookie(
        settings.refresh_name.clone(),
        tokens.refresh.clone(),
        settings.secure,
        (tokens.refresh_expires_at - now).num_seconds(),
    ))
}

/// Expire both session cookies
pub fn clear_session_cookies(jar: CookieJar, settings: &CookieSettings) -> CookieJar {
    [&settings.access_name, &settings.refresh_name]
        .into_iter()
        .fold(jar, |jar, name| {
            jar.add(session_cookie(name.clone(), String::new(), settings.secure, 0))
        })
}
