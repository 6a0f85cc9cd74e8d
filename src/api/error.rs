use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::auth::AuthError;

#[must_use]
pub fn status_code(err: &AuthError) -> StatusCode {
    match err {
        AuthError::Validation(_) => StatusCode::BAD_REQUEST,
        AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
        AuthError::Forbidden => StatusCode::FORBIDDEN,
        AuthError::NotFound => StatusCode::NOT_FOUND,
        AuthError::Conflict => StatusCode::CONFLICT,
        AuthError::Persistence(_) | AuthError::Randomness(_) | AuthError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_code(&self);
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {self:?}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RepoError;

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(
            status_code(&AuthError::validation("bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_code(&AuthError::Unauthenticated),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_code(&AuthError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_code(&AuthError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_code(&AuthError::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_code(&AuthError::Persistence(RepoError::Other(anyhow::anyhow!(
                "down"
            )))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let response = AuthError::Internal("pool exhausted".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
