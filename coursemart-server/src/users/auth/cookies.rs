//! Session cookies.
//!
//! Both tokens travel as `HttpOnly`, `SameSite=Strict` cookies scoped to `/`
//! and kept for seven days. `Secure` is added in production only so local
//! development over plain HTTP still works.

use axum::http::{HeaderMap, HeaderValue, header};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

pub const SESSION_COOKIE_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

fn build(name: &str, value: &str, max_age: u64, secure: bool) -> Option<HeaderValue> {
    let mut cookie =
        format!("{name}={value}; Max-Age={max_age}; Path=/; HttpOnly; SameSite=Strict");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

/// `Set-Cookie` value carrying a token.
pub fn session_cookie(name: &str, value: &str, secure: bool) -> Option<HeaderValue> {
    build(name, value, SESSION_COOKIE_MAX_AGE_SECS, secure)
}

/// `Set-Cookie` value that makes the browser drop the cookie.
pub fn expired_cookie(name: &str, secure: bool) -> Option<HeaderValue> {
    build(name, "", 0, secure)
}

/// Append `Set-Cookie` headers for both tokens.
pub fn set_session_cookies(headers: &mut HeaderMap, access: &str, refresh: &str, secure: bool) {
    for (name, value) in [(ACCESS_TOKEN_COOKIE, access), (REFRESH_TOKEN_COOKIE, refresh)] {
        match session_cookie(name, value, secure) {
            Some(cookie) => {
                headers.append(header::SET_COOKIE, cookie);
            }
            None => tracing::warn!(cookie = name, "token is not a valid cookie value"),
        }
    }
}

pub fn clear_session_cookies(headers: &mut HeaderMap, secure: bool) {
    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
        if let Some(cookie) = expired_cookie(name, secure) {
            headers.append(header::SET_COOKIE, cookie);
        }
    }
}

/// Read one cookie from the request's `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
