use axum::Json;
use utoipa::openapi::{Contact, License};
use utoipa::OpenApi;

use super::handlers::{auth, health, ranks};
use crate::auth::model::{
    ActorSummary, RankCreation, RankDetail, RankModification, RankSummary, RankWithPermissions,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        ranks::list_ranks,
        ranks::get_rank,
        ranks::create_rank,
        ranks::modify_rank,
        ranks::remove_rank,
        auth::current,
        auth::sign_in,
        auth::sign_out,
    ),
    components(schemas(
        health::Health,
        RankSummary,
        RankWithPermissions,
        RankDetail,
        RankCreation,
        RankModification,
        ranks::RankCreated,
        ActorSummary,
        auth::SignInForm,
    )),
    tags(
        (name = "health", description = "Liveness and build information"),
        (name = "ranks", description = "Rank hierarchy management"),
        (name = "auth", description = "Sessions of signed-in players"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.contact = cargo_contact();
    doc.info.license = non_empty(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });
    doc
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `:` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(':').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}
