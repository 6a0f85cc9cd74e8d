//! Expiring session store.
//!
//! Sessions are indexed twice under one lock: by token for lookups and by
//! `(expiration, token)` for sweeping from the earliest expiration. Every write
//! updates both indexes before releasing the lock.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use base64ct::{Base64UrlUnpadded, Encoding};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::crypto;
use super::error::CryptoError;
use super::model::Actor;

/// 256 bits of entropy per token.
const TOKEN_BYTES: usize = 32;

const DEFAULT_LIFETIME: Duration = Duration::from_secs(15 * 60);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
const MIN_DURATION: Duration = Duration::from_secs(1);
/// Upper bound for the lifetime, keeps `now + lifetime` far from `Instant` overflow.
pub const MAX_LIFETIME: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const MIN_SWEEP_TICK: Duration = Duration::from_millis(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    lifetime: Duration,
    sweep_interval: Duration,
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lifetime: DEFAULT_LIFETIME,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    /// Clamp the lifetime into one second to [`MAX_LIFETIME`] and the sweep
    /// interval into one second to [`MAX_SWEEP_INTERVAL`].
    #[must_use]
    pub fn normalize(self) -> Self {
        Self {
            lifetime: self.lifetime.clamp(MIN_DURATION, MAX_LIFETIME),
            sweep_interval: self.sweep_interval.clamp(MIN_DURATION, MAX_SWEEP_INTERVAL),
        }
    }

    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct Session {
    actor: Actor,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Indexes {
    by_token: HashMap<String, Session>,
    by_expiry: BTreeSet<(Instant, String)>,
}

pub struct SessionStore {
    inner: RwLock<Indexes>,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(lifetime: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(Indexes::default()),
            lifetime: lifetime.clamp(MIN_DURATION, MAX_LIFETIME),
            clock,
        }
    }

    #[must_use]
    pub fn with_system_clock(lifetime: Duration) -> Self {
        Self::new(lifetime, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    fn read(&self) -> RwLockReadGuard<'_, Indexes> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Indexes> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind a fresh token to `actor`, expiring one lifetime from now.
    ///
    /// # Errors
    /// Returns `CryptoError::Randomness` if no token could be generated.
    pub fn create(&self, actor: Actor) -> Result<String, CryptoError> {
        loop {
            let token = Base64UrlUnpadded::encode_string(&crypto::random(TOKEN_BYTES)?);
            let mut indexes = self.write();
            if indexes.by_token.contains_key(&token) {
                continue;
            }
            let expires_at = self.clock.now() + self.lifetime;
            indexes.by_expiry.insert((expires_at, token.clone()));
            indexes
                .by_token
                .insert(token.clone(), Session { actor, expires_at });
            return Ok(token);
        }
    }

    /// Actor bound to `token`, unless the session is missing or already expired.
    #[must_use]
    pub fn find(&self, token: &str) -> Option<Actor> {
        let now = self.clock.now();
        self.read()
            .by_token
            .get(token)
            .filter(|session| session.expires_at > now)
            .map(|session| session.actor.clone())
    }

    /// Push the expiration of a live session one lifetime past now.
    ///
    /// Returns `false` for unknown tokens and for expired sessions not yet swept.
    pub fn extend_if_present(&self, token: &str) -> bool {
        let now = self.clock.now();
        let mut guard = self.write();
        let indexes = &mut *guard;
        let Some(session) = indexes.by_token.get_mut(token) else {
            return false;
        };
        if session.expires_at <= now {
            return false;
        }
        indexes
            .by_expiry
            .remove(&(session.expires_at, token.to_string()));
        session.expires_at = now + self.lifetime;
        indexes
            .by_expiry
            .insert((session.expires_at, token.to_string()));
        true
    }

    /// Returns `false` if the token was already absent.
    pub fn remove(&self, token: &str) -> bool {
        let mut indexes = self.write();
        match indexes.by_token.remove(token) {
            Some(session) => {
                indexes
                    .by_expiry
                    .remove(&(session.expires_at, token.to_string()));
                true
            }
            None => false,
        }
    }

    /// Remove every session expiring at or before `now`, earliest first.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut indexes = self.write();
        let mut removed = 0;
        while let Some((expires_at, _)) = indexes.by_expiry.first() {
            if *expires_at > now {
                break;
            }
            if let Some((_, token)) = indexes.by_expiry.pop_first() {
                indexes.by_token.remove(&token);
                removed += 1;
            }
        }
        removed
    }

    pub fn sweep_expired(&self) -> usize {
        self.sweep(self.clock.now())
    }

    /// Number of stored sessions, including expired ones awaiting a sweep.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().by_token.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run [`SessionStore::sweep_expired`] every `interval` until `cancel` fires.
pub fn spawn_sweeper(
    store: Arc<SessionStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(interval.clamp(MIN_SWEEP_TICK, MAX_SWEEP_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?interval, "session sweeper started");

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    info!("session sweeper stopped");
                    break;
                }

                _ = ticker.tick() => {
                    let removed = store.sweep_expired();
                    if removed > 0 {
                        debug!(removed, remaining = store.len(), "swept expired sessions");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::auth::model::DEFAULT_RANK_ID;

    const LIFETIME: Duration = Duration::from_secs(900);

    fn steve() -> Actor {
        Actor {
            id: 7,
            nick: "Steve".to_string(),
            rank_id: DEFAULT_RANK_ID,
        }
    }

    fn store() -> (Arc<ManualClock>, SessionStore) {
        let clock = Arc::new(ManualClock::new());
        let store = SessionStore::new(LIFETIME, clock.clone());
        (clock, store)
    }

    #[test]
    fn created_session_is_found() -> anyhow::Result<()> {
        let (_, store) = store();
        let token = store.create(steve())?;
        assert_eq!(store.find(&token), Some(steve()));
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn token_is_url_safe_and_long_enough() -> anyhow::Result<()> {
        let (_, store) = store();
        let token = store.create(steve())?;
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        Ok(())
    }

    #[test]
    fn same_actor_gets_independent_sessions() -> anyhow::Result<()> {
        let (_, store) = store();
        let first = store.create(steve())?;
        let second = store.create(steve())?;
        assert_ne!(first, second);
        assert_eq!(store.len(), 2);
        assert!(store.remove(&first));
        assert_eq!(store.find(&second), Some(steve()));
        Ok(())
    }

    #[test]
    fn find_does_not_extend() -> anyhow::Result<()> {
        let (clock, store) = store();
        let token = store.create(steve())?;
        clock.advance(LIFETIME - Duration::from_secs(1));
        assert!(store.find(&token).is_some());
        clock.advance(Duration::from_secs(1));
        assert!(store.find(&token).is_none());
        Ok(())
    }

    #[test]
    fn expired_session_is_absent_before_sweep() -> anyhow::Result<()> {
        let (clock, store) = store();
        let token = store.create(steve())?;
        clock.advance(LIFETIME + Duration::from_secs(5));
        assert_eq!(store.len(), 1);
        assert!(store.find(&token).is_none());
        assert!(!store.extend_if_present(&token));
        Ok(())
    }

    #[test]
    fn sweep_after_lifetime_removes_session() -> anyhow::Result<()> {
        let (clock, store) = store();
        let token = store.create(steve())?;
        clock.advance(LIFETIME);
        assert_eq!(store.sweep_expired(), 1);
        assert!(store.find(&token).is_none());
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn extension_survives_sweep() -> anyhow::Result<()> {
        let (clock, store) = store();
        let token = store.create(steve())?;
        clock.advance(LIFETIME - Duration::from_secs(1));
        assert!(store.extend_if_present(&token));
        clock.advance(Duration::from_secs(1));
        assert_eq!(store.sweep_expired(), 0);
        assert_eq!(store.find(&token), Some(steve()));
        Ok(())
    }

    #[test]
    fn sweep_stops_at_first_live_session() -> anyhow::Result<()> {
        let (clock, store) = store();
        let old = store.create(steve())?;
        clock.advance(Duration::from_secs(60));
        let fresh = store.create(steve())?;
        clock.advance(LIFETIME - Duration::from_secs(30));

        assert_eq!(store.sweep_expired(), 1);
        assert!(store.find(&old).is_none());
        assert!(store.find(&fresh).is_some());
        Ok(())
    }

    #[test]
    fn remove_is_idempotent() -> anyhow::Result<()> {
        let (_, store) = store();
        let token = store.create(steve())?;
        assert!(store.remove(&token));
        assert!(!store.remove(&token));
        assert!(!store.extend_if_present(&token));
        assert_eq!(store.sweep_expired(), 0);
        Ok(())
    }

    #[test]
    fn unknown_token_is_absent() {
        let (_, store) = store();
        assert!(store.find("nope").is_none());
        assert!(!store.extend_if_present("nope"));
    }

    #[test]
    fn config_defaults_and_normalize() {
        let config = SessionConfig::default();
        assert_eq!(config.lifetime(), Duration::from_secs(900));
        assert_eq!(config.sweep_interval(), Duration::from_secs(30));

        let config = SessionConfig::new()
            .with_lifetime(Duration::ZERO)
            .with_sweep_interval(Duration::ZERO)
            .normalize();
        assert_eq!(config.lifetime(), Duration::from_secs(1));
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));

        let config = SessionConfig::new()
            .with_lifetime(Duration::from_secs(u64::MAX))
            .with_sweep_interval(Duration::MAX)
            .normalize();
        assert_eq!(config.lifetime(), MAX_LIFETIME);
        assert_eq!(config.sweep_interval(), MAX_SWEEP_INTERVAL);
    }

    #[test]
    fn huge_lifetime_is_capped() -> anyhow::Result<()> {
        let clock = Arc::new(ManualClock::new());
        let store = SessionStore::new(Duration::from_secs(u64::MAX), clock.clone());
        assert_eq!(store.lifetime(), MAX_LIFETIME);

        let token = store.create(steve())?;
        assert!(store.extend_if_present(&token));
        clock.advance(MAX_LIFETIME);
        assert!(store.find(&token).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn sweeper_removes_expired_sessions_and_stops_on_cancel() -> anyhow::Result<()> {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(SessionStore::new(LIFETIME, clock.clone()));
        store.create(steve())?;
        clock.advance(LIFETIME);

        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(store.clone(), Duration::from_millis(10), cancel.clone());

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while !store.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(drained.is_ok());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle).await??;
        Ok(())
    }
}
