//! Input rules checked before any persistence call or in-memory mutation.

use regex::Regex;

use super::error::AuthError;
use super::model::{
    is_pseudo_rank, RankCreation, RankId, RankModification, ServerPermissions,
    DEFAULT_RANK_LEVEL, OWNER_RANK_LEVEL, PERM_RANK_MODIFY, PERM_RANK_VIEW,
};

const NAME_MAX: usize = 30;
const DISPLAY_NAME_MAX: usize = 75;
const CHAT_FORMAT_MAX: usize = 200;
const SECRET_MIN: usize = 6;
const SECRET_MAX: usize = 50;

/// Permissions that can never be removed from a rank.
const GUARDED_PERMISSIONS: [&str; 2] = [PERM_RANK_VIEW, PERM_RANK_MODIFY];

/// 3 to 16 ASCII word characters.
#[must_use]
pub fn nick_valid(nick: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_]{3,16}$").is_ok_and(|regex| regex.is_match(nick))
}

#[must_use]
pub fn secret_valid(secret: &str) -> bool {
    (SECRET_MIN..=SECRET_MAX).contains(&secret.chars().count())
}

/// Dot separated alphanumeric segments, optionally negated with a leading `!`.
#[must_use]
pub fn permission_valid(permission: &str) -> bool {
    Regex::new(r"^!?[A-Za-z0-9]+(\.[A-Za-z0-9]+)*$").is_ok_and(|regex| regex.is_match(permission))
}

fn permissions_valid(permissions: &ServerPermissions) -> bool {
    permissions
        .values()
        .flatten()
        .all(|permission| permission_valid(permission))
}

fn length_within(value: &str, max: usize) -> bool {
    (1..=max).contains(&value.chars().count())
}

fn level_valid(level: i16) -> bool {
    level > 0 && level < OWNER_RANK_LEVEL && level != DEFAULT_RANK_LEVEL
}

/// # Errors
/// Returns `AuthError::Validation` naming the first rule the creation breaks.
pub fn validate_creation(rank: &RankCreation) -> Result<(), AuthError> {
    if !level_valid(rank.level) {
        return Err(AuthError::validation("level is out of range or reserved"));
    }
    if !length_within(&rank.name, NAME_MAX) {
        return Err(AuthError::validation("name must be 1-30 characters"));
    }
    if !length_within(&rank.display_name, DISPLAY_NAME_MAX) {
        return Err(AuthError::validation("display name must be 1-75 characters"));
    }
    if !length_within(&rank.chat_format, CHAT_FORMAT_MAX) {
        return Err(AuthError::validation("chat format must be 1-200 characters"));
    }
    if !permissions_valid(&rank.permissions) {
        return Err(AuthError::validation("permission has invalid format"));
    }
    Ok(())
}

/// Expects an already normalized modification.
///
/// # Errors
/// Returns `AuthError::Validation` naming the first rule the modification breaks.
pub fn validate_modification(id: RankId, rank: &RankModification) -> Result<(), AuthError> {
    if let Some(level) = rank.level {
        if is_pseudo_rank(id) {
            return Err(AuthError::validation("level of a pseudo-rank cannot change"));
        }
        if !level_valid(level) {
            return Err(AuthError::validation("level is out of range or reserved"));
        }
    }
    if rank
        .name
        .as_deref()
        .is_some_and(|name| !length_within(name, NAME_MAX))
    {
        return Err(AuthError::validation("name must be 1-30 characters"));
    }
    if rank
        .display_name
        .as_deref()
        .is_some_and(|name| !length_within(name, DISPLAY_NAME_MAX))
    {
        return Err(AuthError::validation("display name must be 1-75 characters"));
    }
    if rank
        .chat_format
        .as_deref()
        .is_some_and(|format| !length_within(format, CHAT_FORMAT_MAX))
    {
        return Err(AuthError::validation("chat format must be 1-200 characters"));
    }
    if !permissions_valid(&rank.added_permissions) || !permissions_valid(&rank.removed_permissions)
    {
        return Err(AuthError::validation("permission has invalid format"));
    }
    let removed = rank.website_removed();
    if GUARDED_PERMISSIONS
        .iter()
        .any(|guarded| removed.contains(*guarded))
    {
        return Err(AuthError::validation("permission cannot be removed"));
    }
    Ok(())
}
