use anyhow::{Context, Result};
use arrival::api;
use arrival::auth::model::{DEFAULT_RANK_ID, OWNER_RANK_ID};
use arrival::auth::{
    AuthService, CredentialHasher, HasherConfig, InMemoryRepo, ManualClock, SessionStore,
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const STEVE_SECRET: &str = "diamonds42";
const NOTCH_SECRET: &str = "creeper-aww-man";

async fn app() -> Result<Router> {
    let hasher = CredentialHasher::new(
        HasherConfig::new()
            .with_memory_kib(1024)
            .with_time_cost(1)
            .with_parallelism(1),
    );
    let repo = Arc::new(
        InMemoryRepo::new()
            .with_player(7, "Steve", hasher.hash(STEVE_SECRET)?, DEFAULT_RANK_ID)
            .with_player(1, "Notch", hasher.hash(NOTCH_SECRET)?, OWNER_RANK_ID),
    );
    let sessions = Arc::new(SessionStore::new(
        Duration::from_secs(900),
        Arc::new(ManualClock::new()),
    ));
    let service = AuthService::load(repo, hasher, sessions).await?;
    Ok(api::router(Arc::new(service)))
}

fn request(
    method: Method,
    uri: &str,
    sid: Option<&str>,
    body: Option<Value>,
) -> Result<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(sid) = sid {
        builder = builder.header(header::COOKIE, format!("SID={sid}"));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    Ok(builder.body(body)?)
}

async fn send(app: &Router, request: Request<Body>) -> Result<Response> {
    Ok(app.clone().oneshot(request).await?)
}

async fn json_body(response: Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn set_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

async fn sign_in(app: &Router, nick: &str, password: &str) -> Result<String> {
    let response = send(
        app,
        request(
            Method::PUT,
            "/auth/current",
            None,
            Some(json!({ "nick": nick, "password": password })),
        )?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = set_cookie(&response).context("sign-in must set the SID cookie")?;
    let token = cookie
        .strip_prefix("SID=")
        .and_then(|rest| rest.split(';').next())
        .context("malformed SID cookie")?;
    Ok(token.to_string())
}

#[tokio::test]
async fn health_reports_the_build() -> Result<()> {
    let app = app().await?;
    let response = send(&app, request(Method::GET, "/health", None, None)?).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("X-App"));
    assert!(response.headers().contains_key("x-request-id"));
    let body = json_body(response).await?;
    assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    Ok(())
}

#[tokio::test]
async fn openapi_document_is_served() -> Result<()> {
    let app = app().await?;
    let response = send(&app, request(Method::GET, "/openapi.json", None, None)?).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert!(body["paths"]["/ranks/{id}"].is_object());
    Ok(())
}

#[tokio::test]
async fn ranks_require_a_session() -> Result<()> {
    let app = app().await?;
    let response = send(&app, request(Method::GET, "/ranks", None, None)?).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(json_body(response).await?["message"].is_string());
    Ok(())
}

#[tokio::test]
async fn sign_in_sets_the_session_cookie() -> Result<()> {
    let app = app().await?;
    let response = send(
        &app,
        request(
            Method::PUT,
            "/auth/current",
            None,
            Some(json!({ "nick": "Steve", "password": STEVE_SECRET })),
        )?,
    )
    .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response).context("missing Set-Cookie")?;
    assert!(cookie.starts_with("SID="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=900"));

    let body = json_body(response).await?;
    assert_eq!(body["nick"], "Steve");
    assert_eq!(body["rank"]["id"], DEFAULT_RANK_ID);
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_unauthorized() -> Result<()> {
    let app = app().await?;
    let response = send(
        &app,
        request(
            Method::PUT,
            "/auth/current",
            None,
            Some(json!({ "nick": "Steve", "password": "wrong-secret" })),
        )?,
    )
    .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&response).is_none());
    Ok(())
}

#[tokio::test]
async fn malformed_payload_is_bad_request() -> Result<()> {
    let app = app().await?;
    let mut bad = request(Method::PUT, "/auth/current", None, None)?;
    *bad.body_mut() = Body::from("{not json");
    bad.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );

    let response = send(&app, bad).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn owner_lists_ranks_and_cookie_is_refreshed() -> Result<()> {
    let app = app().await?;
    let token = sign_in(&app, "Notch", NOTCH_SECRET).await?;

    let response = send(&app, request(Method::GET, "/ranks", Some(&token), None)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        set_cookie(&response),
        Some(format!(
            "SID={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age=900"
        ))
    );

    let body = json_body(response).await?;
    let levels: Vec<i64> = body
        .as_array()
        .context("ranks must be a list")?
        .iter()
        .filter_map(|rank| rank["level"].as_i64())
        .collect();
    assert_eq!(levels, vec![1000, 32767]);
    Ok(())
}

#[tokio::test]
async fn default_rank_is_forbidden() -> Result<()> {
    let app = app().await?;
    let token = sign_in(&app, "Steve", STEVE_SECRET).await?;

    let response = send(&app, request(Method::GET, "/ranks", Some(&token), None)?).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn unknown_sid_is_cleared() -> Result<()> {
    let app = app().await?;

    let response = send(
        &app,
        request(Method::GET, "/ranks", Some("bogus-token"), None)?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cookie = set_cookie(&response).context("missing Set-Cookie")?;
    assert!(cookie.contains("Max-Age=0"));

    let response = send(
        &app,
        request(Method::GET, "/auth/current", Some("bogus-token"), None)?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn owner_manages_a_rank() -> Result<()> {
    let app = app().await?;
    let token = sign_in(&app, "Notch", NOTCH_SECRET).await?;

    let response = send(
        &app,
        request(
            Method::POST,
            "/ranks",
            Some(&token),
            Some(json!({
                "level": 500,
                "name": "mod",
                "displayName": "Mod",
                "chatFormat": "[Mod] {nick}: {message}",
                "permissions": { "-2": ["ban.give"], "3": ["fly"] }
            })),
        )?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
        .context("missing Location")?;
    let id = json_body(response).await?["id"]
        .as_i64()
        .context("missing id")?;
    assert_eq!(location, format!("/ranks/{id}"));

    let response = send(&app, request(Method::GET, &location, Some(&token), None)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let detail = json_body(response).await?;
    assert_eq!(detail["displayName"], "Mod");
    assert_eq!(detail["permissions"]["-2"], json!(["ban.give"]));
    assert_eq!(detail["permissions"]["3"], json!(["fly"]));

    let response = send(
        &app,
        request(
            Method::PATCH,
            &location,
            Some(&token),
            Some(json!({ "level": 32767 })),
        )?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        request(
            Method::PATCH,
            &location,
            Some(&token),
            Some(json!({ "displayName": "Moderator", "addedPermissions": { "-2": ["kick"] } })),
        )?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(
        &app,
        request(Method::GET, "/auth/current", Some(&token), None)?,
    )
    .await?;
    let current = json_body(response).await?;
    assert_eq!(current["rank"]["id"], OWNER_RANK_ID);
    let owner_permissions = current["rank"]["permissions"]
        .as_array()
        .context("permissions must be a list")?;
    assert!(owner_permissions.contains(&json!("kick")));
    assert!(owner_permissions.contains(&json!("ban.give")));

    let response = send(&app, request(Method::DELETE, &location, Some(&token), None)?).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(&app, request(Method::DELETE, &location, Some(&token), None)?).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        request(
            Method::DELETE,
            &format!("/ranks/{OWNER_RANK_ID}"),
            Some(&token),
            None,
        )?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn sign_out_clears_the_cookie() -> Result<()> {
    let app = app().await?;
    let token = sign_in(&app, "Steve", STEVE_SECRET).await?;

    let response = send(
        &app,
        request(Method::DELETE, "/auth/current", Some(&token), None)?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response).context("missing Set-Cookie")?;
    assert!(cookie.contains("Max-Age=0"));
    assert_eq!(
        json_body(response).await?["message"],
        "Successfully signed out"
    );

    let response = send(
        &app,
        request(Method::DELETE, "/auth/current", Some(&token), None)?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(
        &app,
        request(Method::GET, "/auth/current", Some(&token), None)?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
