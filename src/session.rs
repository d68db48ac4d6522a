//! Session data structure

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Session payload: string keys mapped to JSON values, opaque to the store
pub type SessionData = HashMap<String, Value>;

#[derive(Debug, Default)]
struct SessionState {
    data: SessionData,
    expires_at: Option<DateTime<Utc>>,
}

/// An identified bag of key/value data with an expiration instant
///
/// Every accessor takes the session's internal lock for the duration of the
/// call only, so a `Session` can be shared across tasks behind an `Arc`.
/// Two `Session` values for the same id (for example, loaded twice) are
/// independent and never share state.
///
/// A session does no I/O; call [`SessionStore::save`](crate::SessionStore::save)
/// to persist it.
pub struct Session {
    /// Session ID
    id: String,

    /// Payload and expiration
    state: Mutex<SessionState>,
}

impl Session {
    /// Create a new, empty session with the given ID and no expiration yet
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Rebuild a session from a stored record
    pub(crate) fn from_parts(id: String, data: SessionData, expires_at: DateTime<Utc>) -> Self {
        Self {
            id,
            state: Mutex::new(SessionState {
                data,
                expires_at: Some(expires_at),
            }),
        }
    }

    /// Get the session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.state.lock().data.contains_key(key)
    }

    /// Get a value from the session, `None` if the key is absent
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.lock().data.get(key).cloned()
    }

    /// Get a value and deserialize it, `None` if absent or of another shape
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    /// Set a value in the session
    pub fn set<K: Into<String>, V: Into<Value>>(&self, key: K, value: V) {
        self.state.lock().data.insert(key.into(), value.into());
    }

    /// Serialize any value and set it in the session
    pub fn insert<K: Into<String>, T: Serialize>(
        &self,
        key: K,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.set(key, value);
        Ok(())
    }

    /// Remove a value from the session
    pub fn unset(&self, key: &str) -> Option<Value> {
        self.state.lock().data.remove(key)
    }

    /// Clear all session data
    pub fn clear(&self) {
        self.state.lock().data.clear();
    }

    /// All keys currently set
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().data.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().data.len()
    }

    /// Check if the session is empty (no user data)
    pub fn is_empty(&self) -> bool {
        self.state.lock().data.is_empty()
    }

    /// Get a copy of the session data
    pub fn data(&self) -> SessionData {
        self.state.lock().data.clone()
    }

    /// Expiration set by the last save, `None` if never saved
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().expires_at
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        match self.expires_at() {
            Some(exp) => exp < Utc::now(),
            None => false,
        }
    }

    pub(crate) fn set_expires_at(&self, expires_at: DateTime<Utc>) {
        self.state.lock().expires_at = Some(expires_at);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("data", &state.data)
            .field("expires_at", &state.expires_at)
            .finish()
    }
}
