pub mod auth;
pub mod health;
pub mod ranks;

use axum::http::HeaderMap;

use super::cookie::extract_session_token;
use crate::auth::AuthError;

/// Session token of the request, or `Unauthenticated` when no `SID` cookie was sent.
pub(crate) fn require_sid(headers: &HeaderMap) -> Result<String, AuthError> {
    extract_session_token(headers).ok_or(AuthError::Unauthenticated)
}
