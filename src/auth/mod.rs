//! Rank hierarchy, permission resolution and session handling.
//!
//! [`AuthService`] is the entry point: it owns the [`RankHierarchy`] behind a
//! reader/writer lock, the [`SessionStore`] and the [`CredentialHasher`], and
//! talks to storage through a [`RankRepo`].

pub mod clock;
pub mod crypto;
pub mod error;
pub mod model;
pub mod rank;
pub mod repo;
pub mod service;
pub mod session;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::{CredentialHasher, HasherConfig};
pub use error::{AuthError, CryptoError, HashError, RepoError};
pub use rank::RankHierarchy;
pub use repo::{InMemoryRepo, PgRankRepo, RankRepo};
pub use service::AuthService;
pub use session::{spawn_sweeper, SessionConfig, SessionStore};
