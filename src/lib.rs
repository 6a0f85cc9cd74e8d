//! # Arrival (rank and session authority)
//!
//! `arrival` decides what a signed-in player of the game network may do on the
//! website.
//!
//! ## Ranks
//!
//! Every player holds exactly one rank. Ranks sit on a numeric level and inherit
//! every permission granted by the ranks below them. A rank may negate an
//! inherited permission with a `!` prefixed entry (`!ban.give`); the negation holds
//! for every rank above it until one of them grants the permission again.
//!
//! Two pseudo-ranks always exist and cannot be removed: **Default** (level 1000)
//! and **Owner** (level 32767). `rank.view` and `rank.modifyRank` can never be
//! removed from a rank.
//!
//! ## Sessions
//!
//! Signing in returns an opaque token carried in the `SID` cookie. Sessions expire
//! after their lifetime unless a request touches them first; a background task
//! sweeps expired sessions.
//!
//! ## Passwords
//!
//! Secrets are stored as Argon2id hashes in a self-describing text form, so cost
//! parameters can be raised without invalidating existing hashes.

pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
