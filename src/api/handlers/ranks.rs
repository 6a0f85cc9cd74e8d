//! Rank listing and management. Reads need `rank.view`, writes need `rank.modifyRank`.

use axum::{
    extract::{Extension, Path},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

use super::require_sid;
use crate::auth::{
    model::{
        RankCreation, RankDetail, RankId, RankModification, RankSummary, PERM_RANK_MODIFY,
        PERM_RANK_VIEW,
    },
    AuthError, AuthService,
};

#[derive(ToSchema, Serialize, Debug)]
pub struct RankCreated {
    pub id: RankId,
}

fn missing_payload() -> AuthError {
    AuthError::validation("missing or malformed payload")
}

#[utoipa::path(
    get,
    path = "/ranks",
    responses(
        (status = 200, description = "Every rank, lowest level first", body = [RankSummary]),
        (status = 401, description = "No live session"),
        (status = 403, description = "Missing rank.view"),
    ),
    tag = "ranks"
)]
pub async fn list_ranks(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
) -> Result<Json<Vec<RankSummary>>, AuthError> {
    let token = require_sid(&headers)?;
    service.require_permission(&token, PERM_RANK_VIEW).await?;
    Ok(Json(service.list_ranks_minimal().await))
}

#[utoipa::path(
    get,
    path = "/ranks/{id}",
    params(("id" = i32, Path, description = "Rank id")),
    responses(
        (status = 200, description = "Rank with its entries on every server", body = RankDetail),
        (status = 401, description = "No live session"),
        (status = 403, description = "Missing rank.view"),
        (status = 404, description = "Unknown rank"),
    ),
    tag = "ranks"
)]
pub async fn get_rank(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    Path(id): Path<RankId>,
) -> Result<Json<RankDetail>, AuthError> {
    let token = require_sid(&headers)?;
    service.require_permission(&token, PERM_RANK_VIEW).await?;
    Ok(Json(service.get_rank_detail(id).await?))
}

#[utoipa::path(
    post,
    path = "/ranks",
    request_body = RankCreation,
    responses(
        (status = 201, description = "Rank created", body = RankCreated),
        (status = 400, description = "Invalid rank"),
        (status = 401, description = "No live session"),
        (status = 403, description = "Missing rank.modifyRank"),
        (status = 409, description = "Level already taken"),
    ),
    tag = "ranks"
)]
pub async fn create_rank(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<RankCreation>>,
) -> Result<Response, AuthError> {
    let token = require_sid(&headers)?;
    let actor = service.require_permission(&token, PERM_RANK_MODIFY).await?;
    let Some(Json(rank)) = payload else {
        return Err(missing_payload());
    };

    let id = service.create_rank(rank).await?;
    debug!(player_id = actor.id, rank_id = id, "rank created through the API");

    let mut response_headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/ranks/{id}")) {
        response_headers.insert(LOCATION, location);
    }
    Ok((
        StatusCode::CREATED,
        response_headers,
        Json(RankCreated { id }),
    )
        .into_response())
}

#[utoipa::path(
    patch,
    path = "/ranks/{id}",
    params(("id" = i32, Path, description = "Rank id")),
    request_body = RankModification,
    responses(
        (status = 204, description = "Rank modified"),
        (status = 400, description = "Invalid or forbidden change"),
        (status = 401, description = "No live session"),
        (status = 403, description = "Missing rank.modifyRank"),
        (status = 404, description = "Unknown rank"),
        (status = 409, description = "Level already taken"),
    ),
    tag = "ranks"
)]
pub async fn modify_rank(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    Path(id): Path<RankId>,
    payload: Option<Json<RankModification>>,
) -> Result<StatusCode, AuthError> {
    let token = require_sid(&headers)?;
    service.require_permission(&token, PERM_RANK_MODIFY).await?;
    let Some(Json(modification)) = payload else {
        return Err(missing_payload());
    };

    service.modify_rank(id, modification).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/ranks/{id}",
    params(("id" = i32, Path, description = "Rank id")),
    responses(
        (status = 204, description = "Rank removed"),
        (status = 401, description = "No live session"),
        (status = 403, description = "Missing rank.modifyRank"),
        (status = 404, description = "Unknown rank"),
        (status = 409, description = "Pseudo-rank"),
    ),
    tag = "ranks"
)]
pub async fn remove_rank(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    Path(id): Path<RankId>,
) -> Result<StatusCode, AuthError> {
    let token = require_sid(&headers)?;
    service.require_permission(&token, PERM_RANK_MODIFY).await?;
    service.remove_rank(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
