//! `SID` session cookie helpers.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use std::time::Duration;

pub const SESSION_COOKIE_NAME: &str = "SID";

/// Cookie carrying `token` for `max_age`.
pub fn session_cookie(token: &str, max_age: Duration) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = max_age.as_secs();
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    ))
}

#[must_use]
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("SID=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Value of the first `SID` pair found in the request's `Cookie` headers.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            let val = val.trim();
            (key.trim() == SESSION_COOKIE_NAME && !val.is_empty()).then(|| val.to_string())
        })
}

/// Whether a response already sets the `SID` cookie.
#[must_use]
pub fn sets_session_cookie(headers: &HeaderMap) -> bool {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .any(|value| value.starts_with(&format!("{SESSION_COOKIE_NAME}=")))
}
