//! In-memory session store
//!
//! This is primarily for development and testing.
//! For production, use RedisStore, SqliteStore or another persistent store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::SessionStore;
use crate::config::StoreConfig;
use crate::error::SessionError;
use crate::session::{Session, SessionData};
use crate::sweeper::{Purge, Sweeper};

const BACKEND: &str = "memory";

struct StoredSession {
    data: SessionData,
    expires_at: DateTime<Utc>,
}

impl StoredSession {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at >= now
    }
}

/// Session map shared between the store and its sweeper.
/// One lock covers every operation and the sweep.
#[derive(Clone, Default)]
struct Entries(Arc<Mutex<HashMap<String, StoredSession>>>);

#[async_trait]
impl Purge for Entries {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        let now = Utc::now();
        let mut sessions = self.0.lock();
        let before = sessions.len();
        sessions.retain(|_, stored| stored.is_live(now));
        Ok((before - sessions.len()) as u64)
    }
}

/// In-memory session store
///
/// Saving stores a copy of the session's payload, so changes made to a
/// `Session` after `save` are not visible to `load` until it is saved again.
///
/// Warning: This store is not suitable for production use because:
/// - Sessions are lost on server restart
/// - Sessions are not shared across multiple server instances
pub struct MemoryStore {
    sessions: Entries,
    config: StoreConfig,
    sweeper: Sweeper,
}

impl MemoryStore {
    /// Create a new memory store whose sessions live for `max_age` seconds
    ///
    /// Must be called inside a Tokio runtime, which runs the expiration sweeper.
    pub fn new(max_age: u64) -> Result<Self, SessionError> {
        Self::with_config(StoreConfig::new(max_age))
    }

    /// Create a new memory store from a full configuration
    pub fn with_config(config: StoreConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let sessions = Entries::default();
        let sweeper = Sweeper::spawn(sessions.clone(), config.max_age_duration())?;
        Ok(Self {
            sessions,
            config,
            sweeper,
        })
    }

    /// Number of records held, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.sessions.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove expired sessions now instead of waiting for the sweeper
    pub async fn purge_expired(&self) -> Result<u64, SessionError> {
        self.sessions.purge_expired().await
    }

    /// Whether the background sweeper is still running
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.is_running()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn has(&self, id: &str) -> Result<bool, SessionError> {
        let now = Utc::now();
        let sessions = self.sessions.0.lock();
        Ok(sessions.get(id).is_some_and(|stored| stored.is_live(now)))
    }

    async fn load(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let now = Utc::now();
        let sessions = self.sessions.0.lock();
        Ok(sessions
            .get(id)
            .filter(|stored| stored.is_live(now))
            .map(|stored| Session::from_parts(id.to_string(), stored.data.clone(), stored.expires_at)))
    }

    async fn revoke(&self, id: &str) -> Result<(), SessionError> {
        self.sessions.0.lock().remove(id);
        Ok(())
    }

    async fn save(&self, session: &Session) -> Result<(), SessionError> {
        let data = session.data();
        let mut sessions = self.sessions.0.lock();
        let expires_at = Utc::now() + self.config.max_age_delta();
        sessions.insert(session.id().to_string(), StoredSession { data, expires_at });
        session.set_expires_at(expires_at);
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.sweeper.stop().await
    }
}
