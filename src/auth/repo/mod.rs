//! Persistence collaborator of the gateway.

mod memory;
mod postgres;

pub use memory::InMemoryRepo;
pub use postgres::PgRankRepo;

use async_trait::async_trait;

use super::error::RepoError;
use super::model::{
    CredentialRecord, RankCreation, RankId, RankModification, RankRecord, ServerPermissions,
};

#[async_trait]
pub trait RankRepo: Send + Sync {
    /// Every rank with its own Website entries.
    async fn load_ranks_with_permissions(&self) -> Result<Vec<RankRecord>, RepoError>;

    /// Raw entries of one rank on every server.
    async fn load_permissions(&self, id: RankId) -> Result<ServerPermissions, RepoError>;

    async fn create_rank(&self, rank: &RankCreation) -> Result<RankId, RepoError>;

    /// Fails with `RepoError::NotFound` for unknown and pseudo ranks.
    async fn remove_rank(&self, id: RankId) -> Result<(), RepoError>;

    async fn modify_rank(&self, id: RankId, rank: &RankModification) -> Result<(), RepoError>;

    async fn load_credential(&self, nick: &str) -> Result<CredentialRecord, RepoError>;
}
