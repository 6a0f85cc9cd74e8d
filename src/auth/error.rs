//! Error types for the credential hasher, the persistence collaborator and the
//! authorization gateway.

/// Outcome of verifying a secret against a stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    #[error("wrong secret")]
    WrongSecret,
    #[error("hash is invalid")]
    InvalidHash,
}

/// Failures while producing randomness or deriving a key.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("failed to gather randomness: {0}")]
    Randomness(#[from] rand::Error),
    #[error("key derivation failed: {0}")]
    Kdf(argon2::Error),
}

/// Errors surfaced by a [`RankRepo`](super::repo::RankRepo).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("the resource has not been found")]
    NotFound,
    #[error("a conflict has occurred")]
    Conflict,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors returned by [`AuthService`](super::AuthService) operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("data is invalid: {0}")]
    Validation(String),
    #[error("the player is not authenticated")]
    Unauthenticated,
    #[error("the player does not have a required permission")]
    Forbidden,
    #[error("the resource has not been found")]
    NotFound,
    #[error("a conflict has occurred")]
    Conflict,
    #[error("error while querying the database")]
    Persistence(#[source] RepoError),
    #[error("failed to generate a session token")]
    Randomness(#[source] CryptoError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}

impl From<RepoError> for AuthError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::NotFound,
            RepoError::Conflict => Self::Conflict,
            other => Self::Persistence(other),
        }
    }
}
