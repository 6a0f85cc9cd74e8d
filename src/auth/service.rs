//! Authorization gateway combining the rank hierarchy, the session store and
//! the credential hasher.
//!
//! The hierarchy sits behind one reader/writer lock. Rank mutations hold the
//! exclusive side while they persist, update memory and recompute, so a
//! permission check sees either the old or the new effective sets.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::crypto::CredentialHasher;
use super::error::{AuthError, HashError, RepoError};
use super::model::{
    is_pseudo_rank, Actor, ActorSummary, CredentialRecord, RankCreation, RankDetail, RankId,
    RankModification, RankRecord, RankSummary, RankWithPermissions,
};
use super::rank::RankHierarchy;
use super::repo::RankRepo;
use super::session::SessionStore;
use super::validation;

pub struct AuthService {
    repo: Arc<dyn RankRepo>,
    hasher: Arc<CredentialHasher>,
    sessions: Arc<SessionStore>,
    ranks: RwLock<RankHierarchy>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

fn persistence_failure(operation: &'static str, err: RepoError) -> AuthError {
    let err = AuthError::from(err);
    if let AuthError::Persistence(source) = &err {
        error!(operation, error = %source, "persistence call failed");
    }
    err
}

impl AuthService {
    /// Load every rank and resolve the hierarchy once.
    ///
    /// # Errors
    /// Returns `AuthError::Persistence` if the ranks cannot be loaded.
    pub async fn load(
        repo: Arc<dyn RankRepo>,
        hasher: CredentialHasher,
        sessions: Arc<SessionStore>,
    ) -> Result<Self, AuthError> {
        let records = repo
            .load_ranks_with_permissions()
            .await
            .map_err(|err| persistence_failure("load_ranks", err))?;
        let ranks = RankHierarchy::from_records(records);
        info!(ranks = ranks.len(), "rank hierarchy loaded");

        Ok(Self {
            repo,
            hasher: Arc::new(hasher),
            sessions,
            ranks: RwLock::new(ranks),
        })
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    #[must_use]
    pub fn session_lifetime(&self) -> Duration {
        self.sessions.lifetime()
    }

    #[must_use]
    pub fn nick_valid(nick: &str) -> bool {
        validation::nick_valid(nick)
    }

    pub async fn rank_exists(&self, id: RankId) -> bool {
        self.ranks.read().await.contains(id)
    }

    /// Summaries of every rank, lowest level first.
    pub async fn list_ranks_minimal(&self) -> Vec<RankSummary> {
        self.ranks.read().await.summaries()
    }

    /// # Errors
    /// Returns `AuthError::NotFound` for unknown ranks.
    pub async fn rank_with_permissions(&self, id: RankId) -> Result<RankWithPermissions, AuthError> {
        self.ranks
            .read()
            .await
            .with_permissions(id)
            .ok_or(AuthError::NotFound)
    }

    /// Summary plus the raw entries of every server, read from persistence.
    ///
    /// # Errors
    /// Returns `AuthError::NotFound` for unknown ranks and `AuthError::Persistence`
    /// if the entries cannot be loaded.
    pub async fn get_rank_detail(&self, id: RankId) -> Result<RankDetail, AuthError> {
        let rank = {
            let ranks = self.ranks.read().await;
            ranks
                .get(id)
                .map(|rank| rank.summary().clone())
                .ok_or(AuthError::NotFound)?
        };
        let permissions = self
            .repo
            .load_permissions(id)
            .await
            .map_err(|err| persistence_failure("load_permissions", err))?;
        Ok(RankDetail { rank, permissions })
    }

    /// # Errors
    /// Returns `AuthError::Validation` for malformed input, `AuthError::Conflict`
    /// when the level is taken and `AuthError::Persistence` if storing fails.
    pub async fn create_rank(&self, rank: RankCreation) -> Result<RankId, AuthError> {
        validation::validate_creation(&rank)?;

        let mut ranks = self.ranks.write().await;
        if ranks.level_in_use(rank.level, None) {
            return Err(AuthError::Conflict);
        }
        let id = self
            .repo
            .create_rank(&rank)
            .await
            .map_err(|err| persistence_failure("create_rank", err))?;

        let permissions = rank.website_permissions();
        ranks.insert(RankRecord {
            summary: RankSummary {
                id,
                level: rank.level,
                name: rank.name,
                display_name: rank.display_name,
                chat_format: rank.chat_format,
            },
            permissions,
        });
        info!(rank_id = id, level = rank.level, "rank created");
        Ok(id)
    }

    /// # Errors
    /// Returns `AuthError::Conflict` for pseudo-ranks, `AuthError::NotFound` for
    /// unknown ranks and `AuthError::Persistence` if storing fails.
    pub async fn remove_rank(&self, id: RankId) -> Result<(), AuthError> {
        if is_pseudo_rank(id) {
            return Err(AuthError::Conflict);
        }

        let mut ranks = self.ranks.write().await;
        if !ranks.contains(id) {
            return Err(AuthError::NotFound);
        }
        self.repo
            .remove_rank(id)
            .await
            .map_err(|err| persistence_failure("remove_rank", err))?;

        ranks.remove(id);
        info!(rank_id = id, "rank removed");
        Ok(())
    }

    /// Apply a partial update. Zero levels and empty strings leave a field unchanged.
    ///
    /// # Errors
    /// Returns `AuthError::Validation` for malformed or forbidden changes,
    /// `AuthError::NotFound` for unknown ranks, `AuthError::Conflict` when the new
    /// level is taken and `AuthError::Persistence` if storing fails.
    pub async fn modify_rank(
        &self,
        id: RankId,
        modification: RankModification,
    ) -> Result<(), AuthError> {
        let modification = modification.normalize();
        validation::validate_modification(id, &modification)?;

        let mut ranks = self.ranks.write().await;
        if !ranks.contains(id) {
            return Err(AuthError::NotFound);
        }
        if let Some(level) = modification.level {
            if ranks.level_in_use(level, Some(id)) {
                return Err(AuthError::Conflict);
            }
        }
        self.repo
            .modify_rank(id, &modification)
            .await
            .map_err(|err| persistence_failure("modify_rank", err))?;

        ranks.modify(id, &modification);
        info!(rank_id = id, "rank modified");
        Ok(())
    }

    /// # Errors
    /// Returns `AuthError::Unauthenticated` when the token names no live session.
    pub fn require_auth(&self, token: &str) -> Result<Actor, AuthError> {
        self.sessions.find(token).ok_or(AuthError::Unauthenticated)
    }

    /// # Errors
    /// Returns `AuthError::Unauthenticated` when the token names no live session
    /// and `AuthError::Forbidden` when its actor lacks `permission`.
    pub async fn require_permission(
        &self,
        token: &str,
        permission: &str,
    ) -> Result<Actor, AuthError> {
        let actor = self.require_auth(token)?;
        if self.has_permission(&actor, permission).await {
            Ok(actor)
        } else {
            debug!(player_id = actor.id, permission, "permission denied");
            Err(AuthError::Forbidden)
        }
    }

    /// Membership test on the actor's live rank. An actor whose rank was removed
    /// is checked against Default.
    pub async fn has_permission(&self, actor: &Actor, permission: &str) -> bool {
        let ranks = self.ranks.read().await;
        ranks.has_permission(ranks.actor_rank(actor.rank_id), permission)
    }

    /// # Errors
    /// Returns `AuthError::NotFound` when the token names no live session.
    pub async fn current(&self, token: &str) -> Result<ActorSummary, AuthError> {
        let actor = self.sessions.find(token).ok_or(AuthError::NotFound)?;
        let ranks = self.ranks.read().await;
        let rank = ranks.with_permissions(ranks.actor_rank(actor.rank_id));
        Ok(ActorSummary {
            id: actor.id,
            nick: actor.nick,
            rank,
        })
    }

    /// Verify the credentials and open a session.
    ///
    /// Unknown nicks and wrong secrets both yield `AuthError::Unauthenticated`.
    ///
    /// # Errors
    /// Returns `AuthError::Validation` for a malformed nick or secret,
    /// `AuthError::Unauthenticated` for bad credentials and `AuthError::Persistence`
    /// if the credential record cannot be read.
    pub async fn sign_in(
        &self,
        nick: &str,
        secret: &SecretString,
    ) -> Result<(ActorSummary, String), AuthError> {
        if !validation::nick_valid(nick) {
            return Err(AuthError::validation("nick is invalid"));
        }
        if !validation::secret_valid(secret.expose_secret()) {
            return Err(AuthError::validation("secret must be 6-50 characters"));
        }

        let record = match self.repo.load_credential(nick).await {
            Ok(record) => record,
            Err(RepoError::NotFound) => {
                self.verify_blocking(secret, None).await?;
                debug!(nick, "sign-in for unknown nick");
                return Err(AuthError::Unauthenticated);
            }
            Err(err) => return Err(persistence_failure("load_credential", err)),
        };

        match self.verify_blocking(secret, Some(&record)).await? {
            Ok(()) => {}
            Err(HashError::WrongSecret) => {
                debug!(player_id = record.player_id, "sign-in with wrong secret");
                return Err(AuthError::Unauthenticated);
            }
            Err(HashError::InvalidHash) => {
                warn!(player_id = record.player_id, "stored password hash is invalid");
                return Err(AuthError::Unauthenticated);
            }
        }

        let ranks = self.ranks.read().await;
        let actor = Actor {
            id: record.player_id,
            nick: nick.to_string(),
            rank_id: record.rank_id,
        };
        let token = self
            .sessions
            .create(actor)
            .map_err(AuthError::Randomness)?;
        let summary = ActorSummary {
            id: record.player_id,
            nick: nick.to_string(),
            rank: ranks.with_permissions(ranks.actor_rank(record.rank_id)),
        };
        info!(player_id = record.player_id, "player signed in");
        Ok((summary, token))
    }

    /// Run the KDF off the async workers. Without a record the secret is checked
    /// against a throwaway hash.
    async fn verify_blocking(
        &self,
        secret: &SecretString,
        record: Option<&CredentialRecord>,
    ) -> Result<Result<(), HashError>, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let secret = SecretString::from(secret.expose_secret().to_owned());
        let encoded = record.map(|record| record.password_hash.clone());

        tokio::task::spawn_blocking(move || match encoded {
            Some(encoded) => hasher.verify(secret.expose_secret(), &encoded),
            None => {
                hasher.verify_dummy(secret.expose_secret());
                Err(HashError::WrongSecret)
            }
        })
        .await
        .map_err(|err| AuthError::Internal(format!("verification task failed: {err}")))
    }

    /// Returns `false` if no session had this token.
    pub fn sign_out(&self, token: &str) -> bool {
        let removed = self.sessions.remove(token);
        if removed {
            info!("player signed out");
        }
        removed
    }

    pub fn try_extend_session(&self, token: &str) -> bool {
        self.sessions.extend_if_present(token)
    }
}
