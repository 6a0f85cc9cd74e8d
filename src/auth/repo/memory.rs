//! Process-local [`RankRepo`] used for tests and database-less runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;
use async_trait::async_trait;

use super::RankRepo;
use crate::auth::error::RepoError;
use crate::auth::model::{
    is_pseudo_rank, CredentialRecord, PlayerId, RankCreation, RankId, RankModification,
    RankRecord, RankSummary, ServerPermissions, DEFAULT_RANK_ID, DEFAULT_RANK_LEVEL,
    OWNER_RANK_ID, OWNER_RANK_LEVEL, PERM_RANK_MODIFY, PERM_RANK_VIEW, WEBSITE_SERVER_ID,
};

#[derive(Debug)]
struct StoredRank {
    summary: RankSummary,
    permissions: ServerPermissions,
}

#[derive(Debug)]
struct State {
    ranks: BTreeMap<RankId, StoredRank>,
    players: HashMap<String, CredentialRecord>,
    next_id: RankId,
}

/// Starts with the Default and Owner pseudo-ranks; the Owner holds
/// `rank.view` and `rank.modifyRank` on the Website.
#[derive(Debug)]
pub struct InMemoryRepo {
    state: Mutex<State>,
    fail_writes: AtomicBool,
}

impl InMemoryRepo {
    #[must_use]
    pub fn new() -> Self {
        let mut ranks = BTreeMap::new();
        ranks.insert(
            DEFAULT_RANK_ID,
            StoredRank {
                summary: RankSummary {
                    id: DEFAULT_RANK_ID,
                    level: DEFAULT_RANK_LEVEL,
                    name: "default".to_string(),
                    display_name: "Default".to_string(),
                    chat_format: "{nick}: {message}".to_string(),
                },
                permissions: ServerPermissions::new(),
            },
        );
        ranks.insert(
            OWNER_RANK_ID,
            StoredRank {
                summary: RankSummary {
                    id: OWNER_RANK_ID,
                    level: OWNER_RANK_LEVEL,
                    name: "owner".to_string(),
                    display_name: "Owner".to_string(),
                    chat_format: "[Owner] {nick}: {message}".to_string(),
                },
                permissions: ServerPermissions::from([(
                    WEBSITE_SERVER_ID,
                    BTreeSet::from([PERM_RANK_VIEW.to_string(), PERM_RANK_MODIFY.to_string()]),
                )]),
            },
        );

        Self {
            state: Mutex::new(State {
                ranks,
                players: HashMap::new(),
                next_id: 1,
            }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Register a player able to sign in with `password_hash`.
    #[must_use]
    pub fn with_player(
        self,
        id: PlayerId,
        nick: &str,
        password_hash: impl Into<String>,
        rank_id: RankId,
    ) -> Self {
        self.lock().players.insert(
            nick.to_string(),
            CredentialRecord {
                player_id: id,
                password_hash: password_hash.into(),
                rank_id,
            },
        );
        self
    }

    /// Make every following create, remove and modify call fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Move a player to another rank, as an administrator would out of band.
    pub fn set_player_rank(&self, nick: &str, rank_id: RankId) {
        if let Some(player) = self.lock().players.get_mut(nick) {
            player.rank_id = rank_id;
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<(), RepoError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::Other(anyhow!("storage is unavailable")));
        }
        Ok(())
    }
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

fn level_taken(state: &State, level: i16, except: Option<RankId>) -> bool {
    state
        .ranks
        .values()
        .any(|rank| rank.summary.level == level && Some(rank.summary.id) != except)
}

#[async_trait]
impl RankRepo for InMemoryRepo {
    async fn load_ranks_with_permissions(&self) -> Result<Vec<RankRecord>, RepoError> {
        let state = self.lock();
        let mut records: Vec<RankRecord> = state
            .ranks
            .values()
            .map(|rank| RankRecord {
                summary: rank.summary.clone(),
                permissions: rank
                    .permissions
                    .get(&WEBSITE_SERVER_ID)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();
        records.sort_by_key(|record| (record.summary.level, record.summary.id));
        Ok(records)
    }

    async fn load_permissions(&self, id: RankId) -> Result<ServerPermissions, RepoError> {
        self.lock()
            .ranks
            .get(&id)
            .map(|rank| rank.permissions.clone())
            .ok_or(RepoError::NotFound)
    }

    async fn create_rank(&self, rank: &RankCreation) -> Result<RankId, RepoError> {
        self.check_writable()?;
        let mut state = self.lock();
        if level_taken(&state, rank.level, None) {
            return Err(RepoError::Conflict);
        }

        let id = state.next_id;
        state.next_id += 1;
        let permissions = rank
            .permissions
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(server, entries)| (*server, entries.clone()))
            .collect();
        state.ranks.insert(
            id,
            StoredRank {
                summary: RankSummary {
                    id,
                    level: rank.level,
                    name: rank.name.clone(),
                    display_name: rank.display_name.clone(),
                    chat_format: rank.chat_format.clone(),
                },
                permissions,
            },
        );
        Ok(id)
    }

    async fn remove_rank(&self, id: RankId) -> Result<(), RepoError> {
        self.check_writable()?;
        if is_pseudo_rank(id) {
            return Err(RepoError::NotFound);
        }
        let mut state = self.lock();
        if state.ranks.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        for player in state.players.values_mut() {
            if player.rank_id == id {
                player.rank_id = DEFAULT_RANK_ID;
            }
        }
        Ok(())
    }

    async fn modify_rank(&self, id: RankId, rank: &RankModification) -> Result<(), RepoError> {
        self.check_writable()?;
        let mut state = self.lock();
        if let Some(level) = rank.level {
            if level_taken(&state, level, Some(id)) {
                return Err(RepoError::Conflict);
            }
        }
        let stored = state.ranks.get_mut(&id).ok_or(RepoError::NotFound)?;

        if let Some(level) = rank.level {
            stored.summary.level = level;
        }
        if let Some(name) = &rank.name {
            stored.summary.name.clone_from(name);
        }
        if let Some(display_name) = &rank.display_name {
            stored.summary.display_name.clone_from(display_name);
        }
        if let Some(chat_format) = &rank.chat_format {
            stored.summary.chat_format.clone_from(chat_format);
        }
        for (server, entries) in &rank.removed_permissions {
            if let Some(current) = stored.permissions.get_mut(server) {
                current.retain(|entry| !entries.contains(entry));
            }
        }
        for (server, entries) in &rank.added_permissions {
            stored
                .permissions
                .entry(*server)
                .or_default()
                .extend(entries.iter().cloned());
        }
        stored.permissions.retain(|_, entries| !entries.is_empty());
        Ok(())
    }

    async fn load_credential(&self, nick: &str) -> Result<CredentialRecord, RepoError> {
        self.lock()
            .players
            .get(nick)
            .cloned()
            .ok_or(RepoError::NotFound)
    }
}
