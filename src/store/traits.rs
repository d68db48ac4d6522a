//! Session store trait

use async_trait::async_trait;

use crate::error::SessionError;
use crate::session::Session;

/// Trait for session storage backends
///
/// Every backend gives the same observable results for the same sequence of
/// calls; they differ only in durability and in how they fail. A store is safe
/// to share between tasks, and owns one background sweeper that removes
/// expired records once per max age until [`close`](SessionStore::close).
///
/// A missing session is never an error. Backend failures are reported as
/// [`SessionError::Store`], corrupt payloads as [`SessionError::Serialization`],
/// and nothing is retried.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Check whether an unexpired session exists
    ///
    /// Never evicts; an expired record is reported as absent and left for the sweeper.
    async fn has(&self, id: &str) -> Result<bool, SessionError>;

    /// Load a session by ID, including its payload and expiration
    ///
    /// Returns None if the session doesn't exist or has expired
    async fn load(&self, id: &str) -> Result<Option<Session>, SessionError>;

    /// Delete a session. Deleting an unknown ID succeeds.
    async fn revoke(&self, id: &str) -> Result<(), SessionError>;

    /// Extend a session's expiration to now + max age
    ///
    /// Stores persist the full session, so this is the same as [`save`](SessionStore::save).
    async fn renew(&self, session: &Session) -> Result<(), SessionError> {
        self.save(session).await
    }

    /// Upsert a session with its full payload
    ///
    /// Sets the session's expiration to now + max age, replacing any earlier one.
    async fn save(&self, session: &Session) -> Result<(), SessionError>;

    /// Stop the expiration sweeper and wait for it to exit
    ///
    /// Storage handles passed in by the caller are left open. Calling this
    /// again is a no-op; other operations after close still reach the storage
    /// but expired records are no longer swept.
    async fn close(&self) -> Result<(), SessionError>;
}
