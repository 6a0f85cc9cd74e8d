use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::cookie::{
    clear_session_cookie, extract_session_token, session_cookie, sets_session_cookie,
};
use crate::auth::AuthService;

/// Touch the session named by the `SID` cookie before the handler runs, then
/// refresh the cookie on success or clear it when the session is gone.
///
/// Responses that already set `SID` (sign-in, sign-out) are left alone.
pub async fn extend_session(
    State(service): State<Arc<AuthService>>,
    request: Request,
    next: Next,
) -> Response {
    let extended = extract_session_token(request.headers())
        .map(|token| (service.try_extend_session(&token), token));

    let mut response = next.run(request).await;

    let Some((extended, token)) = extended else {
        return response;
    };
    if sets_session_cookie(response.headers()) {
        return response;
    }

    let cookie = if extended {
        session_cookie(&token, service.session_lifetime()).ok()
    } else {
        Some(clear_session_cookie())
    };
    if let Some(cookie) = cookie {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}
