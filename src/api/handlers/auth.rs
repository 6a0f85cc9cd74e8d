//! `/auth/current`: who am I, sign in, sign out.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use std::{fmt, sync::Arc};
use tracing::error;
use utoipa::ToSchema;

use super::require_sid;
use crate::api::cookie::{clear_session_cookie, extract_session_token, session_cookie};
use crate::auth::{model::ActorSummary, AuthError, AuthService};

#[derive(ToSchema, Deserialize)]
pub struct SignInForm {
    pub nick: String,
    pub password: String,
}

impl fmt::Debug for SignInForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInForm")
            .field("nick", &self.nick)
            .field("password", &"***")
            .finish()
    }
}

#[utoipa::path(
    get,
    path = "/auth/current",
    responses(
        (status = 200, description = "Signed-in player", body = ActorSummary),
        (status = 401, description = "No SID cookie"),
        (status = 404, description = "Session expired or unknown"),
    ),
    tag = "auth"
)]
pub async fn current(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
) -> Result<Json<ActorSummary>, AuthError> {
    let token = require_sid(&headers)?;
    Ok(Json(service.current(&token).await?))
}

#[utoipa::path(
    put,
    path = "/auth/current",
    request_body = SignInForm,
    responses(
        (status = 200, description = "Signed in, SID cookie set", body = ActorSummary),
        (status = 400, description = "Malformed nick or password"),
        (status = 401, description = "Wrong nick or password"),
    ),
    tag = "auth"
)]
pub async fn sign_in(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<SignInForm>>,
) -> Result<Response, AuthError> {
    let Some(Json(form)) = payload else {
        return Err(AuthError::validation("missing or malformed payload"));
    };
    let secret = SecretString::from(form.password);

    let (summary, token) = service.sign_in(&form.nick, &secret).await?;
    let cookie = session_cookie(&token, service.session_lifetime()).map_err(|err| {
        error!("Failed to build session cookie: {err}");
        AuthError::Internal("failed to build session cookie".to_string())
    })?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);
    Ok((StatusCode::OK, response_headers, Json(summary)).into_response())
}

#[utoipa::path(
    delete,
    path = "/auth/current",
    responses(
        (status = 200, description = "Session removed"),
        (status = 204, description = "No session to remove"),
    ),
    tag = "auth"
)]
pub async fn sign_out(headers: HeaderMap, service: Extension<Arc<AuthService>>) -> Response {
    let removed = extract_session_token(&headers).is_some_and(|token| service.sign_out(&token));

    // The cookie is cleared even when the session was already gone.
    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, clear_session_cookie());
    if removed {
        (
            StatusCode::OK,
            response_headers,
            Json(json!({ "message": "Successfully signed out" })),
        )
            .into_response()
    } else {
        (StatusCode::NO_CONTENT, response_headers).into_response()
    }
}
