//! Redis session store
//!
//! Each session is one Redis hash, a small document:
//! - Key: `prefix + session_id` (default prefix: "sess:")
//! - Fields: `id` (written on insert only), `expires_at` (unix milliseconds),
//!   `data` (JSON serialized payload)
//!
//! A sorted set at `index_key` scores every session id by its expiration so the
//! sweeper can delete all expired hashes in one atomic script.

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{from_millis, to_millis, SessionStore};
use crate::config::StoreConfig;
use crate::error::{Operation, SessionError};
use crate::session::{Session, SessionData};
use crate::sweeper::{Purge, Sweeper};

const BACKEND: &str = "redis";

/// Deletes every session scored below ARGV[1] in the index KEYS[1].
/// ARGV[2] is the session key prefix.
const PURGE_SCRIPT: &str = r"
local ids = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', '(' .. ARGV[1])
for _, id in ipairs(ids) do
    redis.call('DEL', ARGV[2] .. id)
end
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', '(' .. ARGV[1])
return #ids
";

#[derive(Clone)]
struct RedisBackend {
    conn: ConnectionManager,
    prefix: String,
    index_key: String,
}

impl RedisBackend {
    /// Make a storage key from session ID
    fn make_key(&self, sid: &str) -> String {
        format!("{}{}", self.prefix, sid)
    }
}

#[async_trait]
impl Purge for RedisBackend {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        let mut conn = self.conn.clone();
        let now = to_millis(Utc::now());

        let removed: u64 = redis::Script::new(PURGE_SCRIPT)
            .key(&self.index_key)
            .arg(now)
            .arg(&self.prefix)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| SessionError::store(BACKEND, Operation::Sweep, e))?;

        Ok(removed)
    }
}

/// Redis session store
///
/// The connection is supplied by the caller and stays usable after
/// [`close`](SessionStore::close); only the sweeper is torn down.
///
/// # Example
///
/// ```rust,ignore
/// use session_store::{RedisStore, SessionStore, Session};
///
/// let client = redis::Client::open("redis://127.0.0.1/")?;
/// let store = RedisStore::new(client, 3600).await?;
///
/// let session = Session::new("user-42");
/// session.set("views", 1);
/// store.save(&session).await?;
/// ```
pub struct RedisStore {
    backend: RedisBackend,
    config: StoreConfig,
    sweeper: Sweeper,
}

impl RedisStore {
    /// Create a new Redis store from a client, with default prefix and index key
    pub async fn new(client: redis::Client, max_age: u64) -> Result<Self, SessionError> {
        let config = StoreConfig::new(max_age);
        config.validate()?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| SessionError::store(BACKEND, Operation::Connect, e))?;
        Self::with_config(conn, config)
    }

    /// Create a new Redis store from an existing connection manager
    pub fn from_connection_manager(
        conn: ConnectionManager,
        max_age: u64,
    ) -> Result<Self, SessionError> {
        Self::with_config(conn, StoreConfig::new(max_age))
    }

    /// Create a new Redis store from a connection manager and a full configuration
    pub fn with_config(conn: ConnectionManager, config: StoreConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let backend = RedisBackend {
            conn,
            prefix: config.prefix.clone(),
            index_key: config.index_key.clone(),
        };
        let sweeper = Sweeper::spawn(backend.clone(), config.max_age_duration())?;
        Ok(Self {
            backend,
            config,
            sweeper,
        })
    }

    /// Remove expired sessions now instead of waiting for the sweeper
    pub async fn purge_expired(&self) -> Result<u64, SessionError> {
        self.backend.purge_expired().await
    }

    /// Whether the background sweeper is still running
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.is_running()
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn has(&self, id: &str) -> Result<bool, SessionError> {
        let key = self.backend.make_key(id);
        let mut conn = self.backend.conn.clone();

        let expires_at: Option<i64> = conn
            .hget(&key, "expires_at")
            .await
            .map_err(|e| SessionError::store(BACKEND, Operation::Has, e))?;

        Ok(expires_at.is_some_and(|ms| ms >= to_millis(Utc::now())))
    }

    async fn load(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let key = self.backend.make_key(id);
        let mut conn = self.backend.conn.clone();

        let (expires_at, data): (Option<i64>, Option<String>) = redis::cmd("HMGET")
            .arg(&key)
            .arg("expires_at")
            .arg("data")
            .query_async(&mut conn)
            .await
            .map_err(|e| SessionError::store(BACKEND, Operation::Load, e))?;

        match (expires_at, data) {
            (None, None) => Ok(None),
            (Some(ms), Some(json)) => {
                if ms < to_millis(Utc::now()) {
                    return Ok(None);
                }
                let data: SessionData = serde_json::from_str(&json)
                    .map_err(|e| SessionError::serialization(BACKEND, Operation::Load, e))?;
                Ok(Some(Session::from_parts(id.to_string(), data, from_millis(ms))))
            }
            _ => Err(SessionError::serialization(
                BACKEND,
                Operation::Load,
                format!("incomplete session record at {}", key),
            )),
        }
    }

    async fn revoke(&self, id: &str) -> Result<(), SessionError> {
        let key = self.backend.make_key(id);
        let mut conn = self.backend.conn.clone();

        let _: () = redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .zrem(&self.backend.index_key, id)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| SessionError::store(BACKEND, Operation::Revoke, e))?;

        Ok(())
    }

    async fn save(&self, session: &Session) -> Result<(), SessionError> {
        let key = self.backend.make_key(session.id());
        let mut conn = self.backend.conn.clone();

        let json = serde_json::to_string(&session.data())
            .map_err(|e| SessionError::serialization(BACKEND, Operation::Save, e))?;
        let expires_at = Utc::now() + self.config.max_age_delta();
        let ms = to_millis(expires_at);

        let _: () = redis::pipe()
            .atomic()
            .hset(&key, "expires_at", ms)
            .ignore()
            .hset(&key, "data", &json)
            .ignore()
            .hset_nx(&key, "id", session.id())
            .ignore()
            .zadd(&self.backend.index_key, session.id(), ms)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| SessionError::store(BACKEND, Operation::Save, e))?;

        session.set_expires_at(expires_at);
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.sweeper.stop().await
    }
}

#[cfg(test)]
mod tests {
    // Tests require a running Redis instance
    // Run with: cargo test --features redis-store -- --ignored

    use super::*;
    use serde_json::json;

    async fn test_store(max_age: u64) -> RedisStore {
        let client = redis::Client::open("redis://127.0.0.1/").unwrap();
        let conn = ConnectionManager::new(client).await.unwrap();
        let tag = uuid::Uuid::new_v4();
        let config = StoreConfig::new(max_age)
            .with_prefix(format!("test-sess-{}:", tag))
            .with_index_key(format!("test-expiry-{}", tag));
        RedisStore::with_config(conn, config).unwrap()
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_store_basic() {
        let store = test_store(3600).await;

        let session = Session::new("test-id");
        session.set("user", "alice");
        store.save(&session).await.unwrap();
        assert!(store.has("test-id").await.unwrap());

        let retrieved = store.load("test-id").await.unwrap().unwrap();
        assert_eq!(retrieved.get_as::<String>("user"), Some("alice".to_string()));
        assert_eq!(
            retrieved.expires_at().map(to_millis),
            session.expires_at().map(to_millis)
        );

        store.revoke("test-id").await.unwrap();
        assert!(store.load("test-id").await.unwrap().is_none());
        store.revoke("test-id").await.unwrap();

        store.close().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_id_written_on_insert_only() {
        let store = test_store(3600).await;
        let session = Session::new("doc");
        session.set("v", 1);
        store.save(&session).await.unwrap();
        session.set("v", 2);
        store.save(&session).await.unwrap();

        let mut conn = store.backend.conn.clone();
        let id: Option<String> = conn.hget(store.backend.make_key("doc"), "id").await.unwrap();
        assert_eq!(id.as_deref(), Some("doc"));

        let loaded = store.load("doc").await.unwrap().unwrap();
        assert_eq!(loaded.get("v"), Some(json!(2)));

        store.revoke("doc").await.unwrap();
        store.close().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_corrupt_payload_is_serialization_error() {
        let store = test_store(3600).await;
        let key = store.backend.make_key("bad");
        let mut conn = store.backend.conn.clone();
        let future = to_millis(Utc::now()) + 60_000;
        let _: () = conn.hset(&key, "expires_at", future).await.unwrap();
        let _: () = conn.hset(&key, "data", "{not json").await.unwrap();

        let err = store.load("bad").await.unwrap_err();
        assert!(err.is_serialization());
        assert_eq!(err.backend(), Some("redis"));

        store.revoke("bad").await.unwrap();
        store.close().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_purge_removes_only_expired() {
        let store = test_store(3600).await;
        let mut conn = store.backend.conn.clone();

        store.save(&Session::new("fresh")).await.unwrap();
        let stale_key = store.backend.make_key("stale");
        let past = to_millis(Utc::now()) - 1000;
        let _: () = conn.hset(&stale_key, "expires_at", past).await.unwrap();
        let _: () = conn.hset(&stale_key, "data", "{}").await.unwrap();
        let _: () = conn.zadd(&store.backend.index_key, "stale", past).await.unwrap();

        assert!(!store.has("stale").await.unwrap());
        assert_eq!(store.purge_expired().await.unwrap(), 1);

        let exists: bool = conn.exists(&stale_key).await.unwrap();
        assert!(!exists);
        assert!(store.has("fresh").await.unwrap());

        store.revoke("fresh").await.unwrap();
        store.close().await.unwrap();
    }
}
