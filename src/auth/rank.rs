//! In-memory rank hierarchy and the permission resolver.
//!
//! Ranks are kept indexed by id and ordered ascending by `(level, id)`. The
//! effective set of every rank is derived by walking that order with a running
//! set: a rank first inserts its plain grants, then removes the targets of its
//! negations, and the rank's effective set is a snapshot of the running set at
//! that point. Every structural change triggers a full walk from the lowest rank.

use std::collections::{BTreeSet, HashMap};

use super::model::{
    RankId, RankModification, RankRecord, RankSummary, RankWithPermissions, DEFAULT_RANK_ID,
};

const NEGATION_PREFIX: char = '!';

#[derive(Clone, Debug)]
pub struct Rank {
    summary: RankSummary,
    own: BTreeSet<String>,
    effective: BTreeSet<String>,
}

impl Rank {
    fn new(record: RankRecord) -> Self {
        Self {
            summary: record.summary,
            own: record.permissions,
            effective: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> RankId {
        self.summary.id
    }

    #[must_use]
    pub fn level(&self) -> i16 {
        self.summary.level
    }

    #[must_use]
    pub fn summary(&self) -> &RankSummary {
        &self.summary
    }

    /// Raw entries of this rank; negations carry a leading `!`.
    #[must_use]
    pub fn own_permissions(&self) -> &BTreeSet<String> {
        &self.own
    }

    #[must_use]
    pub fn effective_permissions(&self) -> &BTreeSet<String> {
        &self.effective
    }
}

#[derive(Clone, Debug, Default)]
pub struct RankHierarchy {
    by_id: HashMap<RankId, Rank>,
    by_level: Vec<RankId>,
}

impl RankHierarchy {
    /// Build the hierarchy from loaded records and resolve it once.
    ///
    /// A later record with an id already seen replaces the earlier one.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = RankRecord>) -> Self {
        let mut hierarchy = Self::default();
        for record in records {
            hierarchy.by_id.insert(record.summary.id, Rank::new(record));
        }
        hierarchy.reorder();
        hierarchy.recompute();
        hierarchy
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: RankId) -> bool {
        self.by_id.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: RankId) -> Option<&Rank> {
        self.by_id.get(&id)
    }

    /// Whether any rank other than `except` sits at `level`.
    #[must_use]
    pub fn level_in_use(&self, level: i16, except: Option<RankId>) -> bool {
        self.by_id
            .values()
            .any(|rank| rank.level() == level && Some(rank.id()) != except)
    }

    /// Ranks ordered from the lowest level up.
    pub fn iter(&self) -> impl Iterator<Item = &Rank> + '_ {
        self.by_level.iter().filter_map(|id| self.by_id.get(id))
    }

    #[must_use]
    pub fn summaries(&self) -> Vec<RankSummary> {
        self.iter().map(|rank| rank.summary.clone()).collect()
    }

    #[must_use]
    pub fn with_permissions(&self, id: RankId) -> Option<RankWithPermissions> {
        self.by_id.get(&id).map(|rank| RankWithPermissions {
            rank: rank.summary.clone(),
            permissions: rank.effective.iter().cloned().collect(),
        })
    }

    /// The rank a player assigned to `id` answers to. Players of a removed rank
    /// fall back to Default, the same move storage makes on removal.
    #[must_use]
    pub fn actor_rank(&self, id: RankId) -> RankId {
        if self.by_id.contains_key(&id) {
            id
        } else {
            DEFAULT_RANK_ID
        }
    }

    /// Membership test against the effective set. Unknown ranks hold nothing.
    #[must_use]
    pub fn has_permission(&self, id: RankId, permission: &str) -> bool {
        self.by_id
            .get(&id)
            .is_some_and(|rank| rank.effective.contains(permission))
    }

    pub fn insert(&mut self, record: RankRecord) {
        self.by_id.insert(record.summary.id, Rank::new(record));
        self.reorder();
        self.recompute();
    }

    /// Returns `false` when no rank has `id`.
    pub fn remove(&mut self, id: RankId) -> bool {
        if self.by_id.remove(&id).is_none() {
            return false;
        }
        self.by_level.retain(|ranked| *ranked != id);
        self.recompute();
        true
    }

    /// Apply a normalized modification. Removed Website entries are dropped from
    /// the rank's own entries before added ones are inserted.
    ///
    /// Returns `false` when no rank has `id`.
    pub fn modify(&mut self, id: RankId, modification: &RankModification) -> bool {
        let Some(rank) = self.by_id.get_mut(&id) else {
            return false;
        };

        let level_changed = match modification.level {
            Some(level) if level != rank.summary.level => {
                rank.summary.level = level;
                true
            }
            _ => false,
        };
        if let Some(name) = &modification.name {
            rank.summary.name.clone_from(name);
        }
        if let Some(display_name) = &modification.display_name {
            rank.summary.display_name.clone_from(display_name);
        }
        if let Some(chat_format) = &modification.chat_format {
            rank.summary.chat_format.clone_from(chat_format);
        }
        for entry in modification.website_removed() {
            rank.own.remove(&entry);
        }
        rank.own.extend(modification.website_added());

        if level_changed {
            self.reorder();
        }
        self.recompute();
        true
    }

    /// Re-derive every effective set from scratch, lowest rank first.
    pub fn recompute(&mut self) {
        let mut running: BTreeSet<String> = BTreeSet::new();
        for id in &self.by_level {
            let Some(rank) = self.by_id.get_mut(id) else {
                continue;
            };
            for entry in &rank.own {
                if !entry.starts_with(NEGATION_PREFIX) {
                    running.insert(entry.clone());
                }
            }
            for entry in &rank.own {
                if let Some(negated) = entry.strip_prefix(NEGATION_PREFIX) {
                    running.remove(negated);
                }
            }
            rank.effective.clone_from(&running);
        }
    }

    fn reorder(&mut self) {
        let mut order: Vec<(i16, RankId)> = self
            .by_id
            .values()
            .map(|rank| (rank.level(), rank.id()))
            .collect();
        order.sort_unstable();
        self.by_level = order.into_iter().map(|(_, id)| id).collect();
    }
}
