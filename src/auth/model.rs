//! Data exchanged between the gateway, request handlers and persistence.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use utoipa::ToSchema;

pub type RankId = i32;
pub type PlayerId = i32;
pub type ServerId = i16;

/// Raw permission entries of one rank, keyed by the server they apply to.
pub type ServerPermissions = BTreeMap<ServerId, BTreeSet<String>>;

/// Pseudo-server holding the permissions that drive the web hierarchy.
pub const WEBSITE_SERVER_ID: ServerId = -2;
/// Pseudo-server standing for the whole game network.
pub const NETWORK_SERVER_ID: ServerId = -1;

pub const DEFAULT_RANK_ID: RankId = -2;
pub const OWNER_RANK_ID: RankId = -1;
pub const DEFAULT_RANK_LEVEL: i16 = 1000;
pub const OWNER_RANK_LEVEL: i16 = i16::MAX;

pub const PERM_RANK_VIEW: &str = "rank.view";
pub const PERM_RANK_MODIFY: &str = "rank.modifyRank";

#[must_use]
pub fn is_pseudo_rank(id: RankId) -> bool {
    id == DEFAULT_RANK_ID || id == OWNER_RANK_ID
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RankSummary {
    pub id: RankId,
    pub level: i16,
    pub name: String,
    pub display_name: String,
    pub chat_format: String,
}

/// A rank as loaded at startup: its summary plus its own Website entries
/// (negations carry a leading `!`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankRecord {
    pub summary: RankSummary,
    pub permissions: BTreeSet<String>,
}

/// Summary plus the effective Website permissions of the rank.
#[derive(ToSchema, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RankWithPermissions {
    #[serde(flatten)]
    pub rank: RankSummary,
    pub permissions: Vec<String>,
}

/// Summary plus every raw entry of the rank, across all servers.
#[derive(ToSchema, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RankDetail {
    #[serde(flatten)]
    pub rank: RankSummary,
    #[schema(value_type = Object)]
    pub permissions: ServerPermissions,
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RankCreation {
    pub level: i16,
    pub name: String,
    pub display_name: String,
    pub chat_format: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub permissions: ServerPermissions,
}

impl RankCreation {
    #[must_use]
    pub fn website_permissions(&self) -> BTreeSet<String> {
        self.permissions
            .get(&WEBSITE_SERVER_ID)
            .cloned()
            .unwrap_or_default()
    }
}

/// Partial update of a rank. Absent, zero and empty values leave a field unchanged.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RankModification {
    #[serde(default)]
    pub level: Option<i16>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub chat_format: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub added_permissions: ServerPermissions,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub removed_permissions: ServerPermissions,
}

impl RankModification {
    /// Collapse zero levels and empty strings into `None`.
    #[must_use]
    pub fn normalize(self) -> Self {
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
        Self {
            level: self.level.filter(|level| *level != 0),
            name: non_empty(self.name),
            display_name: non_empty(self.display_name),
            chat_format: non_empty(self.chat_format),
            added_permissions: self.added_permissions,
            removed_permissions: self.removed_permissions,
        }
    }

    #[must_use]
    pub fn website_added(&self) -> BTreeSet<String> {
        self.added_permissions
            .get(&WEBSITE_SERVER_ID)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn website_removed(&self) -> BTreeSet<String> {
        self.removed_permissions
            .get(&WEBSITE_SERVER_ID)
            .cloned()
            .unwrap_or_default()
    }
}

/// An authenticated player bound to a session.
///
/// Holds the id of its rank, never a copy of the rank's permissions, so permission
/// checks always see the live hierarchy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: PlayerId,
    pub nick: String,
    pub rank_id: RankId,
}

#[derive(ToSchema, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ActorSummary {
    pub id: PlayerId,
    pub nick: String,
    pub rank: Option<RankWithPermissions>,
}

/// Sign-in data of a player, read from persistence on every attempt.
#[derive(Clone)]
pub struct CredentialRecord {
    pub player_id: PlayerId,
    pub password_hash: String,
    pub rank_id: RankId,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("player_id", &self.player_id)
            .field("password_hash", &"***")
            .field("rank_id", &self.rank_id)
            .finish()
    }
}
